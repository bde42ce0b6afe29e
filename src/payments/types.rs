use crate::payments::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Payment status of an order. Mirrors the host order status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Cancelled,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            "expired" => Ok(PaymentStatus::Expired),
            _ => Err(PaymentError::validation(
                format!("unknown payment status: {}", value),
                Some("status"),
            )),
        }
    }
}

/// Outcome code carried by a Duitku callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    Pending,
    Failed,
}

impl ResultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Success => "00",
            ResultCode::Pending => "01",
            ResultCode::Failed => "02",
        }
    }

    /// Status a pending order moves to, if any.
    pub fn target_status(&self) -> Option<PaymentStatus> {
        match self {
            ResultCode::Success => Some(PaymentStatus::Completed),
            ResultCode::Pending => None,
            ResultCode::Failed => Some(PaymentStatus::Cancelled),
        }
    }
}

impl FromStr for ResultCode {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "00" => Ok(ResultCode::Success),
            "01" => Ok(ResultCode::Pending),
            "02" => Ok(ResultCode::Failed),
            other => Err(PaymentError::UnknownResultCode {
                code: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn inquiry_endpoint(&self) -> &'static str {
        match self {
            Environment::Production => {
                "https://passport.duitku.com/webapi/api/merchant/v2/inquiry"
            }
            Environment::Development => "https://sandbox.duitku.com/webapi/api/merchant/v2/inquiry",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub phone: String,
    pub country_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetail {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub billing_address: Address,
    pub shipping_address: Address,
}

/// Body of `POST /merchant/v2/inquiry`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InquiryRequest {
    pub merchant_code: String,
    pub payment_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub merchant_order_id: String,
    pub product_details: String,
    pub customer_va_name: String,
    pub email: String,
    pub phone_number: String,
    pub additional_param: String,
    pub merchant_user_info: String,
    pub customer_detail: CustomerDetail,
    pub callback_url: String,
    pub return_url: String,
    pub signature: String,
    pub expiry_period: u32,
}

/// Inquiry response. Every field is optional on the wire; see `payments::inquiry`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InquiryResponse {
    pub merchant_code: Option<String>,
    pub reference: Option<String>,
    pub payment_url: Option<String>,
    pub va_number: Option<String>,
    pub qr_string: Option<String>,
    pub payment_code: Option<String>,
    pub status_code: Option<String>,
    pub status_message: Option<String>,
}
