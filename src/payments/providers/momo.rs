use crate::config::GatewayConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::signature::{
    CallbackFields, CreateSignatureFields, RefundSignatureFields, SignatureCodec,
};
use crate::payments::types::{
    CreatePaymentRequest, CreatePaymentResponse, ProviderName, RefundRequest, RefundResponse,
    WebhookVerificationResult,
};
use crate::payments::utils::PaymentHttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

const CREATE_PATH: &str = "/v2/gateway/api/create";
const REFUND_PATH: &str = "/v2/gateway/api/refund";

pub struct MomoProvider {
    config: GatewayConfig,
    codec: SignatureCodec,
    http: PaymentHttpClient,
}

impl MomoProvider {
    pub fn new(config: GatewayConfig) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        let codec = SignatureCodec::new(config.access_key.clone(), config.secret_key.clone());
        Ok(Self {
            config,
            codec,
            http,
        })
    }

    pub fn codec(&self) -> &SignatureCodec {
        &self.codec
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    pub fn create_body(&self, request: &CreatePaymentRequest) -> JsonValue {
        let signature = self.codec.build_create_signature(&CreateSignatureFields {
            amount: request.amount,
            extra_data: &request.extra_data,
            ipn_url: &self.config.ipn_url,
            order_id: &request.order_id,
            order_info: &request.order_info,
            partner_code: &self.config.partner_code,
            redirect_url: &self.config.redirect_url,
            request_id: &request.request_id,
            request_type: &self.config.request_type,
        });

        serde_json::json!({
            "partnerCode": self.config.partner_code,
            "accessKey": self.config.access_key,
            "requestId": request.request_id,
            "amount": request.amount,
            "orderId": request.order_id,
            "orderInfo": request.order_info,
            "redirectUrl": self.config.redirect_url,
            "ipnUrl": self.config.ipn_url,
            "extraData": request.extra_data,
            "requestType": self.config.request_type,
            "lang": self.config.lang,
            "signature": signature,
        })
    }

    pub fn refund_body(&self, request: &RefundRequest) -> PaymentResult<JsonValue> {
        let trans_id = request
            .provider_transaction_id
            .trim()
            .parse::<i64>()
            .map_err(|_| PaymentError::ValidationError {
                message: format!(
                    "provider transaction id '{}' is not numeric",
                    request.provider_transaction_id
                ),
                field: Some("transId".to_string()),
            })?;

        let trans_id_text = trans_id.to_string();
        let signature = self.codec.build_refund_signature(&RefundSignatureFields {
            amount: request.amount,
            order_id: &request.order_id,
            partner_code: &self.config.partner_code,
            request_id: &request.request_id,
            trans_id: &trans_id_text,
        });

        Ok(serde_json::json!({
            "partnerCode": self.config.partner_code,
            "accessKey": self.config.access_key,
            "requestId": request.request_id,
            "amount": request.amount,
            "orderId": request.order_id,
            "transId": trans_id,
            "lang": self.config.lang,
            "description": request.description,
            "signature": signature,
        }))
    }

    fn parse_envelope<T: for<'de> Deserialize<'de>>(raw: &JsonValue) -> PaymentResult<T> {
        serde_json::from_value(raw.clone()).map_err(|e| PaymentError::InvalidResponse {
            provider: ProviderName::Momo.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl PaymentProvider for MomoProvider {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> PaymentResult<CreatePaymentResponse> {
        if request.amount <= 0 {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }

        let body = self.create_body(&request);
        let raw: JsonValue = self
            .http
            .post_json(ProviderName::Momo.as_str(), &self.endpoint(CREATE_PATH), &body)
            .await?;
        let envelope: MomoCreateEnvelope = Self::parse_envelope(&raw)?;

        info!(
            order_id = %request.order_id,
            result_code = envelope.result_code,
            "momo create payment answered"
        );

        Ok(CreatePaymentResponse {
            result_code: envelope.result_code,
            message: envelope.message,
            redirect_url: envelope.pay_url.or(envelope.deeplink),
            provider_payload: raw,
        })
    }

    async fn refund(&self, request: RefundRequest) -> PaymentResult<RefundResponse> {
        let body = self.refund_body(&request)?;
        let raw: JsonValue = self
            .http
            .post_json(ProviderName::Momo.as_str(), &self.endpoint(REFUND_PATH), &body)
            .await?;
        let envelope: MomoRefundEnvelope = Self::parse_envelope(&raw)?;

        info!(
            order_id = %request.order_id,
            result_code = envelope.result_code,
            "momo refund answered"
        );

        Ok(RefundResponse {
            result_code: envelope.result_code,
            message: envelope.message,
            provider_payload: raw,
        })
    }

    fn verify_callback(&self, callback: &CallbackFields) -> WebhookVerificationResult {
        if callback.partner_code != self.config.partner_code {
            return WebhookVerificationResult {
                valid: false,
                reason: Some("unexpected partner code".to_string()),
            };
        }
        if !self.codec.verify_callback(callback) {
            return WebhookVerificationResult {
                valid: false,
                reason: Some("signature mismatch".to_string()),
            };
        }
        WebhookVerificationResult {
            valid: true,
            reason: None,
        }
    }

    fn name(&self) -> ProviderName {
        ProviderName::Momo
    }

    fn supported_currencies(&self) -> &'static [&'static str] {
        &["VND"]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MomoCreateEnvelope {
    result_code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    pay_url: Option<String>,
    #[serde(default)]
    deeplink: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MomoRefundEnvelope {
    result_code: i64,
    #[serde(default)]
    message: String,
}
