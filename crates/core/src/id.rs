//! Identifier generation port.

use uuid::Uuid;

use crate::error::Result;

/// Generates identifiers for entities the caller did not name.
///
/// The command layer asks for an id *before* building the creation event so
/// the id can be embedded in the event itself.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Result<String>;
}

impl<G> IdGenerator for std::sync::Arc<G>
where
    G: IdGenerator + ?Sized,
{
    fn next_id(&self) -> Result<String> {
        (**self).next_id()
    }
}

/// Time-ordered UUIDv7 identifiers, rendered in simple (hyphen-less) form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn next_id(&self) -> Result<String> {
        Ok(Uuid::now_v7().simple().to_string())
    }
}
