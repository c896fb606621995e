//! Mock PIX gateway.
//!
//! Builds a simplified BR Code payload in the EMV-MPM layout with a random
//! PIX key and a mocked CRC16 trailer. No real bank is involved.

use crate::payment::{ChargeRequest, PaymentGateway, PixCharge};
use crate::Result;

const MERCHANT_CITY: &str = "SAO PAULO";

#[derive(Clone, Copy, Debug, Default)]
pub struct Pix;

impl Pix {
    fn br_code(&self, request: &ChargeRequest) -> String {
        let key: String = (0..16).map(|_| format!("{:02x}", rand::random::<u8>())).collect();

        // EMV-MPM caps the merchant name field at 25 characters
        let name: String = request
            .recipient_name
            .to_uppercase()
            .replace(' ', "")
            .chars()
            .take(25)
            .collect();
        let value = format!("{:.2}", request.total.amount());
        let transaction_id = request.order_number.payment_reference();

        let mut payload = String::from("000201");
        payload.push_str(&format!(
            "26{:02}0014BR.GOV.BCB.PIX01{}{}",
            key.len() + 25,
            key.len(),
            key
        ));
        payload.push_str("52040000");
        payload.push_str("5303986");
        payload.push_str(&format!("54{:02}{}", value.len(), value));
        payload.push_str("5802BR");
        payload.push_str(&format!("59{:02}{}", name.len(), name));
        payload.push_str(&format!("60{:02}{}", MERCHANT_CITY.len(), MERCHANT_CITY));
        payload.push_str(&format!(
            "62{:02}05{:02}{}",
            transaction_id.len() + 7,
            transaction_id.len(),
            transaction_id
        ));
        payload.push_str("6304");
        payload.push_str("A1B2"); // mocked CRC16
        payload
    }
}

impl PaymentGateway for Pix {
    async fn process(&self, request: &ChargeRequest) -> Result<PixCharge> {
        let qr_code = self.br_code(request);
        tracing::debug!(order = %request.order_number, "generated PIX charge");
        Ok(PixCharge {
            method: "pix".to_string(),
            qr_code,
            transaction_id: format!("PIX_{}", request.order_number),
        })
    }
}
