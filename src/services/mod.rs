//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers:
//! the payment lifecycle engine, the velocity fraud guard, and merchant
//! management.

pub mod merchant_service;
pub mod payment_engine;
pub mod velocity;
