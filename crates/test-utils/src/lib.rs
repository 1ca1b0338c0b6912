//! Shared test utilities for the tiler workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Map config fixtures
//! - A scripted in-memory database connection
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, MockDbConnection};
//! ```

pub mod fixtures;
pub mod mock_db;

pub use mock_db::{MockDbConnection, MockResponse};

/// Assert that generated SQL contains a fragment, printing the whole query
/// on failure.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_sql_contains;
///
/// assert_sql_contains!(sql, "GROUP BY _cdb_gx, _cdb_gy");
/// ```
#[macro_export]
macro_rules! assert_sql_contains {
    ($sql:expr, $fragment:expr) => {{
        let sql: &str = &$sql;
        let fragment: &str = &$fragment;
        if !sql.contains(fragment) {
            panic!(
                "assertion failed: SQL does not contain fragment\n fragment: `{}`\n      sql:\n{}",
                fragment, sql
            );
        }
    }};
}
