//! Property-based tests

mod config_resolution;
