//! Provider adapters, translation and the retry/fallback engine
//!
//! Each wire dialect lives in its own submodule with a `types` file for the
//! wire shapes and a `converter` for the pure canonical <-> wire mapping.
//! [`translate`] dispatches on the candidate's dialect; [`adapter`] performs
//! one HTTP call; [`retry`] and [`routing`] decide what happens after a
//! failure.

pub mod adapter;
pub mod anthropic;
pub mod candidate;
pub mod completion;
pub mod cost;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod registry;
pub mod retry;
pub mod routing;
pub mod schema;
pub mod structured;
pub mod translate;

pub use adapter::{AdapterRegistry, AdapterReply, HttpAdapter, ProviderAdapter};
pub use candidate::{GenerationParams, ProviderCandidate};
pub use cost::CostTracker;
pub use error::{classify, ErrorClass, InvocationError, ProviderError, ProviderResult};
pub use registry::{ModelRef, ProviderCapabilities, ProviderId, WireProtocol};
pub use retry::{RetryDecision, RetryExecutor, RetryPolicy, RetryResult, RetryState, Sleeper, TokioSleeper};
pub use routing::{AttemptRecord, CancellationHandle, FallbackChain, InvocationOutcome};
pub use translate::{from_provider_reply, to_provider_format, ProviderPayload, ProviderReply};
