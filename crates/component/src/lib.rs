#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Palisade Component
//!
//! The contract between the execution core and components: the immutable
//! [`ComponentDefinition`], the object-safe [`Component`] trait the runtime
//! dispatches through, the init-time [`ComponentRegistry`], the
//! [`RetryPolicy`] the runtime enforces, and the [`ActivityContext`] handed
//! to every invocation.
//!
//! Components never see the orchestrator. They receive parsed inputs and
//! params, a context with cancellation / progress / HTTP / secret ports, and
//! they return outputs or a classified [`ComponentError`]. Everything else —
//! routing, retries, persistence, tracing — is the runtime's business.

pub mod builtin;
pub mod component;
pub mod context;
pub mod definition;
pub mod error;
pub mod progress;
pub mod registry;
pub mod retry;

pub use component::{Component, ExecuteRequest};
pub use context::{
    ActivityContext, ActivityLogger, ArtifactStore, HttpPort, HttpRequestSpec, HttpResponseData,
    SecretProvider,
};
pub use definition::{ComponentDefinition, ResolvedPorts, RunnerSpec};
pub use error::ComponentError;
pub use progress::{ProgressEvent, ProgressSink};
pub use registry::{ComponentRegistry, RegistryBuilder};
pub use retry::RetryPolicy;

/// Serde helper for `Duration` serialized as whole seconds.
pub(crate) mod serde_duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
