//! Canonical signing strings for the MoMo gateway.
//!
//! Each signed message has its own fixed key order. The gateway recomputes the
//! same string on its side, so reordering a key produces a valid-looking digest
//! that simply never matches. The field lists below are protocol constants.

use crate::payments::utils::hmac_sha256_hex;
use serde::{Deserialize, Serialize};

/// Fields covered by the create-payment signature.
#[derive(Debug, Clone)]
pub struct CreateSignatureFields<'a> {
    pub amount: i64,
    pub extra_data: &'a str,
    pub ipn_url: &'a str,
    pub order_id: &'a str,
    pub order_info: &'a str,
    pub partner_code: &'a str,
    pub redirect_url: &'a str,
    pub request_id: &'a str,
    pub request_type: &'a str,
}

/// Inbound callback (IPN) body.
///
/// Every field except `transId` is required: a body missing one fails to
/// deserialize instead of being signed with a blank value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallbackFields {
    pub partner_code: String,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    pub order_info: String,
    pub order_type: String,
    #[serde(default)]
    pub trans_id: Option<i64>,
    pub result_code: i64,
    pub message: String,
    pub pay_type: String,
    pub response_time: i64,
    pub extra_data: String,
    pub signature: String,
}

impl CallbackFields {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

/// Fields covered by the refund signature.
#[derive(Debug, Clone)]
pub struct RefundSignatureFields<'a> {
    pub amount: i64,
    pub order_id: &'a str,
    pub partner_code: &'a str,
    pub request_id: &'a str,
    pub trans_id: &'a str,
}

/// Builds and checks HMAC-SHA256 signatures with the partner's key pair.
#[derive(Clone)]
pub struct SignatureCodec {
    access_key: String,
    secret_key: String,
}

impl SignatureCodec {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn create_raw_signature(&self, fields: &CreateSignatureFields<'_>) -> String {
        format!(
            "accessKey={}&amount={}&extraData={}&ipnUrl={}&orderId={}&orderInfo={}&partnerCode={}&redirectUrl={}&requestId={}&requestType={}",
            self.access_key,
            fields.amount,
            fields.extra_data,
            fields.ipn_url,
            fields.order_id,
            fields.order_info,
            fields.partner_code,
            fields.redirect_url,
            fields.request_id,
            fields.request_type,
        )
    }

    pub fn callback_raw_signature(&self, fields: &CallbackFields) -> String {
        let trans_id = fields
            .trans_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        format!(
            "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}&orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}&resultCode={}&transId={}",
            self.access_key,
            fields.amount,
            fields.extra_data,
            fields.message,
            fields.order_id,
            fields.order_info,
            fields.order_type,
            fields.partner_code,
            fields.pay_type,
            fields.request_id,
            fields.response_time,
            fields.result_code,
            trans_id,
        )
    }

    pub fn refund_raw_signature(&self, fields: &RefundSignatureFields<'_>) -> String {
        format!(
            "amount={}&orderId={}&partnerCode={}&requestId={}&transId={}",
            fields.amount, fields.order_id, fields.partner_code, fields.request_id, fields.trans_id,
        )
    }

    pub fn build_create_signature(&self, fields: &CreateSignatureFields<'_>) -> String {
        self.sign(&self.create_raw_signature(fields))
    }

    pub fn build_callback_signature(&self, fields: &CallbackFields) -> String {
        self.sign(&self.callback_raw_signature(fields))
    }

    pub fn build_refund_signature(&self, fields: &RefundSignatureFields<'_>) -> String {
        self.sign(&self.refund_raw_signature(fields))
    }

    /// Exact, case-sensitive comparison.
    pub fn verify(expected: &str, received: &str) -> bool {
        expected == received
    }

    /// Recompute the callback signature and compare it with the one it carries.
    pub fn verify_callback(&self, fields: &CallbackFields) -> bool {
        Self::verify(&self.build_callback_signature(fields), &fields.signature)
    }

    fn sign(&self, raw: &str) -> String {
        hmac_sha256_hex(&self.secret_key, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_KEY: &str = "F8BBA842ECF85";
    const SECRET_KEY: &str = "K951B6PE1waDMi640xX08PD3vg6EkVlz";

    fn codec() -> SignatureCodec {
        SignatureCodec::new(ACCESS_KEY, SECRET_KEY)
    }

    fn callback() -> CallbackFields {
        CallbackFields {
            partner_code: "MOMO".to_string(),
            order_id: "ORDER-1".to_string(),
            request_id: "REQ-1".to_string(),
            amount: 200,
            order_info: "Tour booking payment".to_string(),
            order_type: "momo_wallet".to_string(),
            trans_id: Some(4088878653),
            result_code: 0,
            message: "Successful.".to_string(),
            pay_type: "qr".to_string(),
            response_time: 1760000000000,
            extra_data: "eyJib29raW5nSWQiOiJiMSJ9".to_string(),
            signature: String::new(),
        }
    }

    #[test]
    fn create_signature_uses_documented_key_order() {
        let fields = CreateSignatureFields {
            amount: 200,
            extra_data: "eyJib29raW5nSWQiOiJiMSJ9",
            ipn_url: "https://api.example.com/webhooks/momo",
            order_id: "ORDER-1",
            order_info: "Tour booking payment",
            partner_code: "MOMO",
            redirect_url: "https://app.example.com/payments/return",
            request_id: "REQ-1",
            request_type: "captureWallet",
        };

        assert_eq!(
            codec().create_raw_signature(&fields),
            "accessKey=F8BBA842ECF85&amount=200&extraData=eyJib29raW5nSWQiOiJiMSJ9&ipnUrl=https://api.example.com/webhooks/momo&orderId=ORDER-1&orderInfo=Tour booking payment&partnerCode=MOMO&redirectUrl=https://app.example.com/payments/return&requestId=REQ-1&requestType=captureWallet"
        );
        assert_eq!(
            codec().build_create_signature(&fields),
            "5c8d10deeeffc8afeef0ed23cf99702700716392de7789460b300bd6f62c4e23"
        );
    }

    #[test]
    fn callback_signature_round_trips_through_verify() {
        let mut fields = callback();
        fields.signature = codec().build_callback_signature(&fields);
        assert_eq!(
            fields.signature,
            "27f2b1a8aab98eea50825e537ba66eebf6048d6fea27a9063ae5a5dae8463a32"
        );
        assert!(codec().verify_callback(&fields));

        fields.amount = 201;
        assert!(!codec().verify_callback(&fields));
    }

    #[test]
    fn callback_without_trans_id_signs_empty_value() {
        let mut fields = callback();
        fields.trans_id = None;
        assert!(codec().callback_raw_signature(&fields).ends_with("&transId="));
    }

    #[test]
    fn refund_signature_covers_five_fields() {
        let fields = RefundSignatureFields {
            amount: 200,
            order_id: "REFUND-1",
            partner_code: "MOMO",
            request_id: "REQ-2",
            trans_id: "4088878653",
        };
        assert_eq!(
            codec().build_refund_signature(&fields),
            "642a5a6c5e9f3c885808414a909305e0ff01478c83a22792fc24c38559507959"
        );
    }

    #[test]
    fn verify_is_case_sensitive() {
        assert!(SignatureCodec::verify("abc123", "abc123"));
        assert!(!SignatureCodec::verify("abc123", "ABC123"));
        assert!(!SignatureCodec::verify("abc123", ""));
    }

    #[test]
    fn callback_body_requires_named_fields() {
        let missing_result_code = serde_json::json!({
            "partnerCode": "MOMO",
            "orderId": "ORDER-1",
            "requestId": "REQ-1",
            "amount": 200,
            "orderInfo": "Tour booking payment",
            "orderType": "momo_wallet",
            "message": "Successful.",
            "payType": "qr",
            "responseTime": 1760000000000i64,
            "extraData": "",
            "signature": "deadbeef"
        });
        assert!(serde_json::from_value::<CallbackFields>(missing_result_code).is_err());
    }
}
