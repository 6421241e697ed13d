//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that receives request data, delegates
//! to a service or the payment engine, and returns a JSON response. Error
//! mapping to status codes lives in `crate::error`.

/// API key issuance endpoint
pub mod auth;
/// Health check endpoint
pub mod health;
/// Merchant management endpoints
pub mod merchants;
/// Payment and callback endpoints
pub mod payments;
