//! Settlement services: initiation, callbacks, refunds and status reads

pub mod callback_processor;
pub mod error;
pub mod payment_initiator;
pub mod payment_status;
pub mod refund_initiator;

pub use callback_processor::{CallbackDisposition, CallbackProcessor};
pub use error::{SettlementError, SettlementResult};
pub use payment_initiator::{InitiatePaymentCommand, InitiatedPayment, PaymentInitiator};
pub use payment_status::{PaymentStatusService, PaymentStatusView};
pub use refund_initiator::{RefundCommand, RefundInitiator, RefundResult};
