use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::payments::utils::secure_eq;

type HmacSha256 = Hmac<Sha256>;

const NONCE_ACTION: &str = "duitku-ajax-nonce";
const TICK_SECONDS: i64 = 12 * 60 * 60;

/// Time-windowed anti-forgery token for the buyer-facing status endpoint.
///
/// A token is bound to one order and stays valid for the current and the
/// previous 12-hour tick.
#[derive(Clone)]
pub struct NonceIssuer {
    secret: Vec<u8>,
}

impl NonceIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    pub fn issue(&self, order_id: i64, now: DateTime<Utc>) -> String {
        self.token_for_tick(order_id, tick(now))
    }

    pub fn verify(&self, token: &str, order_id: i64, now: DateTime<Utc>) -> bool {
        let token = token.trim();
        if token.is_empty() {
            return false;
        }
        let current = tick(now);
        [current, current - 1].iter().any(|t| {
            secure_eq(
                self.token_for_tick(order_id, *t).as_bytes(),
                token.as_bytes(),
            )
        })
    }

    fn token_for_tick(&self, order_id: i64, tick: i64) -> String {
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            // HMAC accepts keys of any length.
            Err(_) => return String::new(),
        };
        mac.update(format!("{}|{}|{}", NONCE_ACTION, order_id, tick).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn tick(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(TICK_SECONDS)
}
