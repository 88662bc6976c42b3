//! Payment settlement for the tour-booking marketplace.
//!
//! Initiates gateway payments, applies signed asynchronous callbacks exactly
//! once, and refunds captured payments, keeping each payment attempt and its
//! booking consistent.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
