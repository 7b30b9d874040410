//! Integration tests for the world and step pipeline.
//!
//! These tests drive a [`sim_core::World`] through its public API only:
//! - joints holding bodies together under gravity
//! - motors and stops
//! - contacts rebuilt through constraint groups
//! - the body/joint graph across destruction and group resets
//! - integration and solver reporting

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

pub mod common;
pub mod contacts;
pub mod graph;
pub mod joints;
pub mod motors;
pub mod stepping;
