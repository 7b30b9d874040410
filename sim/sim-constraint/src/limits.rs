//! Joint stops and motors along a single axis.
//!
//! A [`LimitMotor`] adds at most one bounded row to its joint. The row is
//! present while the motor is powered (`fmax > 0`) or the joint position is
//! at or past a stop. At a stop the row pushes the joint back inside with
//! one-sided bounds; a motor alone drives the joint velocity toward `vel`
//! with force bounded by `fmax`.
//!
//! When both happen at once the single row cannot do both jobs, so the stop
//! wins and the motor effort is applied directly as a feed-forward force
//! (scaled by the fudge factor when the motor pulls away from the stop).

use nalgebra::Vector3;
use sim_types::{JointParam, Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::row::{BodyPair, RowBlock, StepContext};

/// Where a joint position sits relative to its stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopState {
    /// Strictly between the stops.
    Free,
    /// At or below the lower stop; `error` is `position - lo` (non-positive).
    AtLow {
        /// Signed distance past the stop.
        error: f64,
    },
    /// At or above the upper stop; `error` is `position - hi` (non-negative).
    AtHigh {
        /// Signed distance past the stop.
        error: f64,
    },
}

impl StopState {
    /// Whether a stop is engaged.
    #[must_use]
    pub fn is_at_stop(self) -> bool {
        !matches!(self, Self::Free)
    }
}

/// Whether the limited coordinate is an angle or a distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    /// Rotation about the axis.
    Angular,
    /// Translation along the axis.
    Linear,
}

/// Stop and motor parameters for one joint axis.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LimitMotor {
    lo_stop: f64,
    hi_stop: f64,
    vel: f64,
    fmax: f64,
    fudge_factor: f64,
    bounce: f64,
    stop_erp: Option<f64>,
    stop_cfm: f64,
}

impl Default for LimitMotor {
    fn default() -> Self {
        Self {
            lo_stop: f64::NEG_INFINITY,
            hi_stop: f64::INFINITY,
            vel: 0.0,
            fmax: 0.0,
            fudge_factor: 1.0,
            bounce: 0.0,
            stop_erp: None,
            stop_cfm: 0.0,
        }
    }
}

impl LimitMotor {
    /// Unlimited, unpowered axis.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both stops at once.
    pub fn set_stops(&mut self, lo: f64, hi: f64) -> Result<()> {
        if lo.is_nan() || hi.is_nan() {
            return Err(SimError::NonFinite { what: "stop" });
        }
        if lo > hi {
            return Err(SimError::InvalidStops { lo, hi });
        }
        self.lo_stop = lo;
        self.hi_stop = hi;
        Ok(())
    }

    /// Builder form of [`LimitMotor::set_stops`].
    pub fn with_stops(mut self, lo: f64, hi: f64) -> Result<Self> {
        self.set_stops(lo, hi)?;
        Ok(self)
    }

    /// Builder form for the motor target and force limit.
    pub fn with_motor(mut self, vel: f64, fmax: f64) -> Result<Self> {
        self.set_param(JointParam::Vel, vel)?;
        self.set_param(JointParam::FMax, fmax)?;
        Ok(self)
    }

    /// Lower stop.
    #[must_use]
    pub fn lo_stop(&self) -> f64 {
        self.lo_stop
    }

    /// Upper stop.
    #[must_use]
    pub fn hi_stop(&self) -> f64 {
        self.hi_stop
    }

    /// Motor target velocity.
    #[must_use]
    pub fn vel(&self) -> f64 {
        self.vel
    }

    /// Motor force limit.
    #[must_use]
    pub fn fmax(&self) -> f64 {
        self.fmax
    }

    /// Whether the motor is switched on.
    #[must_use]
    pub fn is_powered(&self) -> bool {
        self.fmax > 0.0
    }

    /// Set one parameter. `Vel2`/`FMax2` are rejected here; joints with a
    /// second motor route them to that motor as `Vel`/`FMax`.
    pub fn set_param(&mut self, param: JointParam, value: f64) -> Result<()> {
        match param {
            JointParam::LoStop => self.set_stops(value, self.hi_stop),
            JointParam::HiStop => self.set_stops(self.lo_stop, value),
            JointParam::Vel => {
                sim_types::error::ensure_finite(value, "motor velocity")?;
                self.vel = value;
                Ok(())
            }
            JointParam::FMax => {
                sim_types::error::ensure_finite(value, "motor force limit")?;
                if value < 0.0 {
                    return Err(SimError::invalid_config("fmax cannot be negative"));
                }
                self.fmax = value;
                Ok(())
            }
            JointParam::FudgeFactor => {
                unit_interval(value, "fudge factor")?;
                self.fudge_factor = value;
                Ok(())
            }
            JointParam::Bounce => {
                unit_interval(value, "bounce")?;
                self.bounce = value;
                Ok(())
            }
            JointParam::StopErp => {
                sim_types::error::ensure_finite(value, "stop erp")?;
                if value < 0.0 {
                    self.stop_erp = None;
                } else {
                    unit_interval(value, "stop erp")?;
                    self.stop_erp = Some(value);
                }
                Ok(())
            }
            JointParam::StopCfm => {
                sim_types::error::ensure_finite(value, "stop cfm")?;
                if value < 0.0 {
                    return Err(SimError::invalid_config("stop cfm cannot be negative"));
                }
                self.stop_cfm = value;
                Ok(())
            }
            JointParam::Vel2 | JointParam::FMax2 => {
                Err(SimError::unsupported("second-axis parameter", "single-axis"))
            }
        }
    }

    /// Read one parameter. `StopErp` reads `-1` while the world ERP is used.
    pub fn param(&self, param: JointParam) -> Result<f64> {
        match param {
            JointParam::LoStop => Ok(self.lo_stop),
            JointParam::HiStop => Ok(self.hi_stop),
            JointParam::Vel => Ok(self.vel),
            JointParam::FMax => Ok(self.fmax),
            JointParam::FudgeFactor => Ok(self.fudge_factor),
            JointParam::Bounce => Ok(self.bounce),
            JointParam::StopErp => Ok(self.stop_erp.unwrap_or(-1.0)),
            JointParam::StopCfm => Ok(self.stop_cfm),
            JointParam::Vel2 | JointParam::FMax2 => {
                Err(SimError::unsupported("second-axis parameter", "single-axis"))
            }
        }
    }

    /// Classify `position` against the stops.
    #[must_use]
    pub fn stop_state(&self, position: f64) -> StopState {
        if position <= self.lo_stop {
            StopState::AtLow {
                error: position - self.lo_stop,
            }
        } else if position >= self.hi_stop {
            StopState::AtHigh {
                error: position - self.hi_stop,
            }
        } else {
            StopState::Free
        }
    }

    /// Whether the axis needs a row in the given state.
    #[must_use]
    pub fn needs_row(&self, state: StopState) -> bool {
        self.is_powered() || state.is_at_stop()
    }

    /// Fill row `i` of `block` for this axis and return how many rows were
    /// used (0 or 1). `axis` is the unit world axis seen from the first body.
    #[allow(clippy::float_cmp, clippy::too_many_arguments)]
    pub fn fill_row(
        &self,
        state: StopState,
        motion: Motion,
        axis: &Vector3<f64>,
        ctx: &StepContext,
        bodies: &BodyPair<'_>,
        block: &mut RowBlock<'_>,
        i: usize,
    ) -> usize {
        if !self.needs_row(state) {
            return 0;
        }

        // A linear axis on two bodies also couples their rotation so the
        // force acts through the midpoint of the body origins.
        let decouple = match (motion, bodies.second) {
            (Motion::Linear, Some(b2)) => 0.5 * (b2.position - bodies.first.position).cross(axis),
            _ => Vector3::zeros(),
        };
        match motion {
            Motion::Angular => block.set_angular(i, *axis),
            Motion::Linear => {
                block.set_first(i, *axis, decouple);
                block.set_second(i, -axis, decouple);
            }
        }

        let locked = state.is_at_stop() && self.lo_stop == self.hi_stop;
        if self.is_powered() && !locked {
            match state {
                StopState::Free => {
                    block.set_rhs(i, self.vel);
                    block.set_bounds(i, -self.fmax, self.fmax);
                }
                StopState::AtLow { .. } | StopState::AtHigh { .. } => {
                    let pushes_up = self.vel > 0.0
                        || (self.vel == 0.0 && matches!(state, StopState::AtHigh { .. }));
                    let mut effort = if pushes_up { self.fmax } else { -self.fmax };
                    let away_from_stop = match state {
                        StopState::AtLow { .. } => self.vel > 0.0,
                        StopState::AtHigh { .. } => self.vel < 0.0,
                        StopState::Free => false,
                    };
                    if away_from_stop {
                        effort *= self.fudge_factor;
                    }
                    match motion {
                        Motion::Angular => block.add_torque_pair(effort * axis),
                        Motion::Linear => {
                            block.add_force_pair(effort * axis);
                            block.add_torques(effort * decouple, effort * decouple);
                        }
                    }
                }
            }
        }

        let error = match state {
            StopState::Free => return 1,
            StopState::AtLow { error } | StopState::AtHigh { error } => error,
        };

        let erp = self.stop_erp.unwrap_or(ctx.erp);
        let mut rhs = -ctx.fps * erp * error;
        block.set_cfm(i, self.stop_cfm);

        if locked {
            block.set_bounds(i, f64::NEG_INFINITY, f64::INFINITY);
        } else {
            let at_low = matches!(state, StopState::AtLow { .. });
            if at_low {
                block.set_bounds(i, 0.0, f64::INFINITY);
            } else {
                block.set_bounds(i, f64::NEG_INFINITY, 0.0);
            }

            if self.bounce > 0.0 {
                let v = block.row(i).velocity(bodies);
                let rebound = -self.bounce * v;
                if (at_low && v < 0.0 && rebound > rhs) || (!at_low && v > 0.0 && rebound < rhs) {
                    rhs = rebound;
                }
            }
        }
        block.set_rhs(i, rhs);
        1
    }
}

fn unit_interval(value: f64, what: &'static str) -> Result<()> {
    sim_types::error::ensure_finite(value, what)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::invalid_config(format!(
            "{what} must be between 0 and 1, got {value}"
        )))
    }
}
