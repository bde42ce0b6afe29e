//! Duitku payment gateway service.
//!
//! Creates Duitku transactions for host orders, verifies payment callbacks,
//! answers the buyer page's status polls and expires overdue orders.

pub mod api;
pub mod config;
pub mod database;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
pub mod workers;
