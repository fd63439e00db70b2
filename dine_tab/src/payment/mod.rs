//! Payment lock module.
//!
//! A tab moves `active -> payment_locked` when a guest starts paying, back to
//! `active` if that payment fails, and on to `completed` when the provider
//! confirms it. Administrative cancellation closes an active tab without
//! payment.

pub mod coordinator;

pub use coordinator::PaymentLockCoordinator;
