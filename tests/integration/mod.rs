//! Integration tests for the jig run orchestrator

mod command_engine;
mod run_scenarios;
mod test_utils;
