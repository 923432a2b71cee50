//! Helpers for tests that need a real, migrated database.
pub mod prepare_env;
