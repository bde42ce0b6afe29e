pub mod client;
pub mod error;
pub mod fee;
pub mod inquiry;
pub mod methods;
pub mod provider;
pub mod signature;
pub mod types;
pub mod utils;

pub use client::DuitkuClient;
pub use error::{PaymentError, PaymentResult};
pub use provider::PaymentGateway;
