//! Payment lifecycle services

pub mod callback_handler;
pub mod expiry;
pub mod nonce;
pub mod payment_status;
pub mod transaction;
