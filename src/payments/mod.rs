pub mod correlation;
pub mod error;
pub mod provider;
pub mod providers;
pub mod signature;
pub mod state;
pub mod store;
pub mod types;
pub mod utils;

pub use error::{PaymentError, PaymentResult};
pub use provider::PaymentProvider;
pub use signature::{CallbackFields, SignatureCodec};
pub use types::{PaymentAttempt, PaymentAttemptStatus, ProviderName};
