//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables.

/// API key authentication model
pub mod api_key;
/// Transaction audit trail model
pub mod audit_log;
/// Merchant model and CRUD request types
pub mod merchant;
/// Payment transaction model and request types
pub mod transaction;
