// ABOUTME: Configuration constants shared across DroneGuide packages
// ABOUTME: Environment variable names and default values

pub mod constants;
pub mod defaults;
