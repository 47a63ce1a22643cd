//! Generation and embedding provider abstraction for codeqa.

pub mod error;
pub(crate) mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
pub mod retry;

pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
pub use retry::{RetryPolicy, retry_with_backoff};
