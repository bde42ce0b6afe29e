//! Payment-method descriptors.
//!
//! Every Duitku channel is described by data instead of code: which response
//! field it needs, where the buyer is sent afterwards, and its fee policy.

use serde::Serialize;

use crate::payments::fee::FeePolicy;

/// Response field a method cannot do without.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Buyer picks a channel on Duitku's hosted page; `paymentUrl` is required.
    HostedPage,
    VirtualAccount,
    QrString,
    RetailCode,
}

impl InstrumentKind {
    /// Name of the inquiry-response field carrying the instrument.
    pub fn response_field(&self) -> &'static str {
        match self {
            InstrumentKind::HostedPage => "paymentUrl",
            InstrumentKind::VirtualAccount => "vaNumber",
            InstrumentKind::QrString => "qrString",
            InstrumentKind::RetailCode => "paymentCode",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    GatewayPaymentUrl,
    HostPaymentPage,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentMethodDescriptor {
    pub id: String,
    pub title: String,
    /// Duitku `paymentMethod` code; `None` lets the buyer choose on Duitku's page.
    pub payment_code: Option<String>,
    pub instrument: InstrumentKind,
    pub redirect: RedirectTarget,
    pub fee: FeePolicy,
    /// Overrides the global expiry period when set.
    pub expiry_minutes: Option<u32>,
    pub enabled: bool,
}

impl PaymentMethodDescriptor {
    fn builtin(
        id: &str,
        title: &str,
        payment_code: Option<&str>,
        instrument: InstrumentKind,
        redirect: RedirectTarget,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            payment_code: payment_code.map(str::to_string),
            instrument,
            redirect,
            fee: FeePolicy::default(),
            expiry_minutes: None,
            enabled: true,
        }
    }

    pub fn effective_expiry_minutes(&self, global_minutes: u32) -> u32 {
        self.expiry_minutes.unwrap_or(global_minutes)
    }

    pub fn fee_label(&self) -> String {
        format!("Payment Fee ({})", self.title)
    }
}

pub fn default_methods() -> Vec<PaymentMethodDescriptor> {
    vec![
        PaymentMethodDescriptor::builtin(
            "duitku",
            "Duitku Payment",
            None,
            InstrumentKind::HostedPage,
            RedirectTarget::GatewayPaymentUrl,
        ),
        PaymentMethodDescriptor::builtin(
            "duitku_permata",
            "Permata Virtual Account",
            Some("BT"),
            InstrumentKind::VirtualAccount,
            RedirectTarget::HostPaymentPage,
        ),
        PaymentMethodDescriptor::builtin(
            "duitku_mandiri",
            "Mandiri Virtual Account",
            Some("M2"),
            InstrumentKind::VirtualAccount,
            RedirectTarget::HostPaymentPage,
        ),
        PaymentMethodDescriptor::builtin(
            "duitku_shopeepay",
            "ShopeePay QRIS",
            Some("SP"),
            InstrumentKind::QrString,
            RedirectTarget::HostPaymentPage,
        ),
        PaymentMethodDescriptor::builtin(
            "duitku_alfamart",
            "Alfamart",
            Some("FT"),
            InstrumentKind::RetailCode,
            RedirectTarget::HostPaymentPage,
        ),
    ]
}
