//! # SoftDesk Shared Library
//!
//! Types, persistence and access-control logic shared by the SoftDesk API
//! server and its integration tests.
//!
//! ## Module Organization
//!
//! - `models`: Database models (accounts, projects, memberships, issues, notes)
//! - `db`: Connection pool and migrations
//! - `auth`: Passwords, JWT tokens, auth context and authorization predicates
//! - `visibility`: Narrowing list results along the membership chain

pub mod auth;
pub mod db;
pub mod models;
pub mod visibility;

/// Current version of the SoftDesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
