//! Control-plane events.
//!
//! Events are persisted with a [`VersionedSerializer`] and delivered in order
//! per routing key.

use crate::error::{WireError, WireResult};
use crate::revision::{RevisionDataInput, RevisionDataOutput};
use crate::serializer::{FormatVersion, ObjectBuilder, VersionedSerializer};
use uuid::Uuid;

/// A control-plane work item.
pub trait ControllerEvent {
    /// Routing key. Events with the same key are processed in order.
    fn key(&self) -> String;
}

/// Request to delete a reader group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReaderGroupEvent {
    /// Scope containing the reader group.
    pub scope: String,
    /// Reader group name.
    pub reader_group: String,
    /// Request id used for tracing.
    pub request_id: i64,
    /// Reader group id.
    pub reader_group_id: Uuid,
    /// Reader group generation.
    pub generation: i64,
}

impl DeleteReaderGroupEvent {
    /// Returns an empty builder.
    pub fn builder() -> DeleteReaderGroupEventBuilder {
        DeleteReaderGroupEventBuilder::default()
    }
}

impl ControllerEvent for DeleteReaderGroupEvent {
    fn key(&self) -> String {
        format!("{}/{}", self.scope, self.reader_group)
    }
}

/// Builder for [`DeleteReaderGroupEvent`].
#[derive(Debug, Default, Clone)]
pub struct DeleteReaderGroupEventBuilder {
    scope: Option<String>,
    reader_group: Option<String>,
    request_id: Option<i64>,
    reader_group_id: Option<Uuid>,
    generation: i64,
}

impl DeleteReaderGroupEventBuilder {
    /// Sets the scope.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the reader group name.
    #[must_use]
    pub fn reader_group(mut self, name: impl Into<String>) -> Self {
        self.reader_group = Some(name.into());
        self
    }

    /// Sets the request id.
    #[must_use]
    pub fn request_id(mut self, id: i64) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Sets the reader group id.
    #[must_use]
    pub fn reader_group_id(mut self, id: Uuid) -> Self {
        self.reader_group_id = Some(id);
        self
    }

    /// Sets the generation.
    #[must_use]
    pub fn generation(mut self, generation: i64) -> Self {
        self.generation = generation;
        self
    }
}

impl ObjectBuilder for DeleteReaderGroupEventBuilder {
    type Target = DeleteReaderGroupEvent;

    fn build(self) -> WireResult<DeleteReaderGroupEvent> {
        Ok(DeleteReaderGroupEvent {
            scope: self.scope.ok_or(WireError::MissingField { field: "scope" })?,
            reader_group: self.reader_group.ok_or(WireError::MissingField {
                field: "reader_group",
            })?,
            request_id: self.request_id.ok_or(WireError::MissingField {
                field: "request_id",
            })?,
            reader_group_id: self.reader_group_id.ok_or(WireError::MissingField {
                field: "reader_group_id",
            })?,
            generation: self.generation,
        })
    }
}

/// Serializer for [`DeleteReaderGroupEvent`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DeleteReaderGroupEventSerializer;

impl DeleteReaderGroupEventSerializer {
    fn write00(e: &DeleteReaderGroupEvent, target: &mut RevisionDataOutput) -> WireResult<()> {
        target.write_utf(&e.scope)?;
        target.write_utf(&e.reader_group)?;
        target.write_i64(e.request_id);
        target.write_uuid(&e.reader_group_id);
        target.write_i64(e.generation);
        Ok(())
    }

    fn read00(
        source: &mut RevisionDataInput<'_>,
        b: &mut DeleteReaderGroupEventBuilder,
    ) -> WireResult<()> {
        b.scope = Some(source.read_utf()?);
        b.reader_group = Some(source.read_utf()?);
        b.request_id = Some(source.read_i64()?);
        b.reader_group_id = Some(source.read_uuid()?);
        b.generation = source.read_i64()?;
        Ok(())
    }
}

impl VersionedSerializer for DeleteReaderGroupEventSerializer {
    type Item = DeleteReaderGroupEvent;
    type Builder = DeleteReaderGroupEventBuilder;

    fn write_version(&self) -> u8 {
        0
    }

    fn declare_versions(
        &self,
    ) -> Vec<FormatVersion<DeleteReaderGroupEvent, DeleteReaderGroupEventBuilder>> {
        vec![FormatVersion::new(0).revision(0, Self::write00, Self::read00)]
    }

    fn new_builder(&self) -> DeleteReaderGroupEventBuilder {
        DeleteReaderGroupEvent::builder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> DeleteReaderGroupEvent {
        DeleteReaderGroupEvent::builder()
            .scope("scope1")
            .reader_group("rg1")
            .request_id(123)
            .reader_group_id(Uuid::from_u128(0x1234))
            .generation(5)
            .build()
            .unwrap()
    }

    #[test]
    fn routing_key_is_scope_slash_name() {
        assert_eq!(event().key(), "scope1/rg1");
    }

    #[test]
    fn serialize_and_read_back() {
        let bytes = DeleteReaderGroupEventSerializer.serialize(&event()).unwrap();
        assert_eq!(bytes[0], 0, "write version");
        assert_eq!(bytes[1], 1, "one revision");
        let decoded = DeleteReaderGroupEventSerializer.deserialize(&bytes).unwrap();
        assert_eq!(decoded, event());
        assert_eq!(decoded.key(), "scope1/rg1");
    }

    #[test]
    fn builder_requires_identity_fields() {
        let result = DeleteReaderGroupEvent::builder().scope("s").build();
        assert_eq!(
            result,
            Err(WireError::MissingField {
                field: "reader_group"
            })
        );
    }

    #[test]
    fn generation_defaults_to_zero() {
        let e = DeleteReaderGroupEvent::builder()
            .scope("s")
            .reader_group("g")
            .request_id(1)
            .reader_group_id(Uuid::nil())
            .build()
            .unwrap();
        assert_eq!(e.generation, 0);
    }
}
