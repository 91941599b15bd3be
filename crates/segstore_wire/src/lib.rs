//! # segstore Wire
//!
//! Versioned binary serialization for segstore.
//!
//! This crate provides:
//! - Field writers and readers ([`RevisionDataOutput`], [`RevisionDataInput`])
//! - [`VersionedSerializer`], which frames each item as a version marker
//!   followed by revision-tagged, length-delimited field groups
//! - Control-plane events with stable routing keys
//!
//! ## Compatibility Rules
//!
//! - Revisions within a version are append-only and numbered `0, 1, 2, ...`
//! - Readers skip revisions they do not know, byte-exactly
//! - Unknown versions are rejected
//!
//! ## Usage
//!
//! ```
//! use segstore_wire::{
//!     ControllerEvent, DeleteReaderGroupEvent, DeleteReaderGroupEventSerializer,
//!     ObjectBuilder, VersionedSerializer,
//! };
//! use uuid::Uuid;
//!
//! let event = DeleteReaderGroupEvent::builder()
//!     .scope("scope")
//!     .reader_group("readers")
//!     .request_id(1)
//!     .reader_group_id(Uuid::nil())
//!     .build()
//!     .unwrap();
//!
//! let bytes = DeleteReaderGroupEventSerializer.serialize(&event).unwrap();
//! let decoded = DeleteReaderGroupEventSerializer.deserialize(&bytes).unwrap();
//! assert_eq!(decoded.key(), "scope/readers");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod events;
mod revision;
mod serializer;

pub use error::{WireError, WireResult};
pub use events::{
    ControllerEvent, DeleteReaderGroupEvent, DeleteReaderGroupEventBuilder,
    DeleteReaderGroupEventSerializer,
};
pub use revision::{RevisionDataInput, RevisionDataOutput};
pub use serializer::{
    FormatRevision, FormatVersion, ObjectBuilder, RevisionReader, RevisionWriter,
    VersionedSerializer,
};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    proptest! {
        #[test]
        fn delete_reader_group_event_survives_serialization(
            scope in "[a-z][a-z0-9]{0,16}",
            group in "[a-z][a-z0-9]{0,16}",
            request_id in any::<i64>(),
            id in any::<u128>(),
            generation in any::<i64>(),
        ) {
            let event = DeleteReaderGroupEvent {
                scope: scope.clone(),
                reader_group: group.clone(),
                request_id,
                reader_group_id: Uuid::from_u128(id),
                generation,
            };
            let bytes = DeleteReaderGroupEventSerializer.serialize(&event).unwrap();
            let decoded = DeleteReaderGroupEventSerializer.deserialize(&bytes).unwrap();
            prop_assert_eq!(decoded.key(), format!("{}/{}", scope, group));
            prop_assert_eq!(decoded, event);
        }
    }
}
