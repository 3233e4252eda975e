//! Helpers for tests in this crate and its dependents. Enabled with the `test_utils` feature.
pub mod mocks;
pub mod prepare_env;
