//! Infrastructure layer: reference adapters for the command-side ports.

pub mod crypto;
pub mod event_store;
pub mod id;

pub use crypto::{AesGcmEncryptor, Sha256SecretHasher, random_token};
pub use event_store::{EventStoreError, Eventstore, InMemoryEventstore};
pub use id::SnowflakeIdGenerator;
