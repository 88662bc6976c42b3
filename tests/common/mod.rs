#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tourbook_payments::config::{SettlementConfig, SignatureMode};
use tourbook_payments::database::memory::InMemorySettlementStore;
use tourbook_payments::payments::error::PaymentResult;
use tourbook_payments::payments::provider::PaymentProvider;
use tourbook_payments::payments::signature::{CallbackFields, SignatureCodec};
use tourbook_payments::payments::types::{
    Booking, BookingPaymentStatus, BookingStatus, CreatePaymentRequest, CreatePaymentResponse,
    ProviderName, RefundRequest, RefundResponse, WebhookVerificationResult,
};
use tourbook_payments::services::{
    CallbackProcessor, PaymentInitiator, PaymentStatusService, RefundInitiator,
};
use uuid::Uuid;

pub const PARTNER_CODE: &str = "MOMOBKUN20180529";
pub const ACCESS_KEY: &str = "klm05TvNBzhg7h7j";
pub const SECRET_KEY: &str = "at67qH6mk8w5Y1nAyMoYKMWACiEi2bsa";

/// Gateway double: accepts creates and refunds, verifies callbacks with the real codec.
pub struct StubGateway {
    codec: SignatureCodec,
    pub creates: Mutex<Vec<CreatePaymentRequest>>,
    pub refund_calls: AtomicUsize,
}

impl StubGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            codec: SignatureCodec::new(ACCESS_KEY, SECRET_KEY),
            creates: Mutex::new(Vec::new()),
            refund_calls: AtomicUsize::new(0),
        })
    }

    pub fn refund_count(&self) -> usize {
        self.refund_calls.load(Ordering::SeqCst)
    }

    pub fn last_create(&self) -> CreatePaymentRequest {
        self.creates
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no create call recorded")
    }

    /// A callback for the last create call, signed with the shared secret.
    pub fn signed_callback(&self, result_code: i64, trans_id: Option<i64>) -> JsonValue {
        let create = self.last_create();
        let mut fields = CallbackFields {
            partner_code: PARTNER_CODE.to_string(),
            order_id: create.order_id,
            request_id: create.request_id,
            amount: create.amount,
            order_info: create.order_info,
            order_type: "momo_wallet".to_string(),
            trans_id,
            result_code,
            message: if result_code == 0 {
                "Successful.".to_string()
            } else {
                "Transaction denied by user.".to_string()
            },
            pay_type: "qr".to_string(),
            response_time: 1_721_720_663_942,
            extra_data: create.extra_data,
            signature: String::new(),
        };
        fields.signature = self.codec.build_callback_signature(&fields);
        serde_json::to_value(fields).unwrap()
    }
}

#[async_trait]
impl PaymentProvider for StubGateway {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> PaymentResult<CreatePaymentResponse> {
        let order_id = request.order_id.clone();
        self.creates.lock().unwrap().push(request);
        Ok(CreatePaymentResponse {
            result_code: 0,
            message: "Successful.".to_string(),
            redirect_url: Some(format!("https://test-payment.momo.vn/pay/{}", order_id)),
            provider_payload: json!({"resultCode": 0, "orderId": order_id}),
        })
    }

    async fn refund(&self, request: RefundRequest) -> PaymentResult<RefundResponse> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RefundResponse {
            result_code: 0,
            message: "Successful.".to_string(),
            provider_payload: json!({
                "resultCode": 0,
                "orderId": request.order_id,
                "amount": request.amount,
                "transId": request.provider_transaction_id,
            }),
        })
    }

    fn verify_callback(&self, callback: &CallbackFields) -> WebhookVerificationResult {
        let valid = callback.partner_code == PARTNER_CODE && self.codec.verify_callback(callback);
        WebhookVerificationResult {
            valid,
            reason: (!valid).then(|| "signature mismatch".to_string()),
        }
    }

    fn name(&self) -> ProviderName {
        ProviderName::Momo
    }

    fn supported_currencies(&self) -> &'static [&'static str] {
        &["VND"]
    }
}

pub struct Harness {
    pub store: Arc<InMemorySettlementStore>,
    pub gateway: Arc<StubGateway>,
    pub initiator: PaymentInitiator,
    pub callbacks: CallbackProcessor,
    pub refunds: RefundInitiator,
    pub status: PaymentStatusService,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemorySettlementStore::new());
        let gateway = StubGateway::new();
        Self {
            initiator: PaymentInitiator::new(
                store.clone(),
                gateway.clone(),
                SettlementConfig::default(),
            ),
            callbacks: CallbackProcessor::new(store.clone(), gateway.clone(), SignatureMode::Strict),
            refunds: RefundInitiator::new(store.clone(), gateway.clone()),
            status: PaymentStatusService::new(store.clone()),
            store,
            gateway,
        }
    }

    /// Seeds a pending booking priced at `total_price` VND.
    pub async fn booking(&self, total_price: i64) -> Uuid {
        let booking_id = Uuid::new_v4();
        self.store
            .insert_booking(Booking {
                id: booking_id,
                customer_id: Uuid::new_v4(),
                guide_id: Uuid::new_v4(),
                status: BookingStatus::Pending,
                payment_status: BookingPaymentStatus::Pending,
                total_price: BigDecimal::from(total_price),
            })
            .await;
        booking_id
    }
}
