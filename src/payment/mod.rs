//! Payment gateways.
//!
//! Only PIX is wired up; the gateway is a trait so checkout can be exercised
//! against failing doubles in tests.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Money, OrderNumber};
use crate::Result;

pub mod pix;

pub use pix::Pix;

/// What checkout hands to a gateway.
#[derive(Clone, Debug)]
pub struct ChargeRequest {
    pub recipient_name: String,
    pub total: Money,
    pub order_number: OrderNumber,
}

/// A requested PIX charge: the copy-paste BR Code payload plus a transaction
/// reference. QR image rendering is left to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixCharge {
    pub method: String,
    pub qr_code: String,
    pub transaction_id: String,
}

pub trait PaymentGateway: Send + Sync {
    async fn process(&self, request: &ChargeRequest) -> Result<PixCharge>;
}
