//! `warden-core` — command-side foundation building blocks.
//!
//! This crate contains **pure** primitives shared by every other crate:
//! the error taxonomy, the request context, result descriptors, lifecycle
//! states and the ports for id generation and secret handling.

pub mod aggregate;
pub mod context;
pub mod crypto;
pub mod details;
pub mod error;
pub mod id;
pub mod state;

pub use aggregate::ExpectedVersion;
pub use context::CommandContext;
pub use crypto::{CryptoError, CryptoValue, SecretEncryptor, SecretHasher};
pub use details::ObjectDetails;
pub use error::{Error, Result};
pub use id::{IdGenerator, UuidV7Generator};
pub use state::{Exists, LifecycleState, ObjectState};
