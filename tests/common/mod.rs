//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Seeded in-memory gateways
//! - Snapshot waiting helpers
//! - Custom assertion macros

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;

pub use fixtures::*;
