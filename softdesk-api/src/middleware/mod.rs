/// Middleware for the API server
///
/// - `auth`: Bearer token authentication for `/v1` resource routes
/// - `security`: Security response headers

pub mod auth;
pub mod security;
