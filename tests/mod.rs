//! Test suite for Pricecraft
//!
//! This module organizes all tests

pub mod integration;
pub mod property;
