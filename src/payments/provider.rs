use crate::payments::error::PaymentResult;
use crate::payments::signature::CallbackFields;
use crate::payments::types::{
    CreatePaymentRequest, CreatePaymentResponse, ProviderName, RefundRequest, RefundResponse,
    WebhookVerificationResult,
};
use async_trait::async_trait;

/// A signed gateway with a create endpoint, an asynchronous callback and a refund endpoint.
///
/// A non-zero provider result code is returned as `Ok`; only transport and
/// protocol failures are errors.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> PaymentResult<CreatePaymentResponse>;

    async fn refund(&self, request: RefundRequest) -> PaymentResult<RefundResponse>;

    fn verify_callback(&self, callback: &CallbackFields) -> WebhookVerificationResult;

    fn name(&self) -> ProviderName;

    fn supported_currencies(&self) -> &'static [&'static str];
}
