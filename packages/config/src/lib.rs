// ABOUTME: Configuration and environment variable management for PMStation
// ABOUTME: Exposes variable names and typed parsing helpers with defaults

pub mod constants;
pub mod env;
