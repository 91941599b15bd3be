//! Operations recorded in a container's operation log.

use segstore_wire::{
    FormatVersion, ObjectBuilder, RevisionDataInput, RevisionDataOutput, VersionedSerializer,
    WireError, WireResult,
};

/// Type of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperationType {
    /// Create a segment.
    CreateSegment = 1,
    /// Append bytes to a segment.
    Append = 2,
    /// Seal a segment.
    Seal = 3,
    /// Delete a segment.
    Delete = 4,
}

impl OperationType {
    /// Converts a byte to an operation type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::CreateSegment),
            2 => Some(Self::Append),
            3 => Some(Self::Seal),
            4 => Some(Self::Delete),
            _ => None,
        }
    }

    /// Converts the operation type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A segment mutation, logged before it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a segment.
    CreateSegment {
        /// Segment name.
        segment: String,
    },

    /// Append bytes to a segment.
    Append {
        /// Segment name.
        segment: String,
        /// Offset of the first appended byte.
        offset: u64,
        /// Appended bytes.
        data: Vec<u8>,
    },

    /// Seal a segment.
    Seal {
        /// Segment name.
        segment: String,
    },

    /// Delete a segment.
    Delete {
        /// Segment name.
        segment: String,
    },
}

impl Operation {
    /// Returns the operation type.
    #[must_use]
    pub fn operation_type(&self) -> OperationType {
        match self {
            Operation::CreateSegment { .. } => OperationType::CreateSegment,
            Operation::Append { .. } => OperationType::Append,
            Operation::Seal { .. } => OperationType::Seal,
            Operation::Delete { .. } => OperationType::Delete,
        }
    }

    /// Returns the segment the operation applies to.
    pub fn segment(&self) -> &str {
        match self {
            Operation::CreateSegment { segment }
            | Operation::Append { segment, .. }
            | Operation::Seal { segment }
            | Operation::Delete { segment } => segment,
        }
    }
}

/// Incremental builder used while decoding an [`Operation`].
#[derive(Debug, Default)]
pub struct OperationBuilder {
    operation_type: Option<OperationType>,
    segment: Option<String>,
    offset: u64,
    data: Vec<u8>,
}

impl ObjectBuilder for OperationBuilder {
    type Target = Operation;

    fn build(self) -> WireResult<Operation> {
        let operation_type = self.operation_type.ok_or(WireError::MissingField {
            field: "operation_type",
        })?;
        let segment = self
            .segment
            .ok_or(WireError::MissingField { field: "segment" })?;

        Ok(match operation_type {
            OperationType::CreateSegment => Operation::CreateSegment { segment },
            OperationType::Append => Operation::Append {
                segment,
                offset: self.offset,
                data: self.data,
            },
            OperationType::Seal => Operation::Seal { segment },
            OperationType::Delete => Operation::Delete { segment },
        })
    }
}

/// Serializer for log entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct OperationSerializer;

impl OperationSerializer {
    fn write00(op: &Operation, target: &mut RevisionDataOutput) -> WireResult<()> {
        target.write_u8(op.operation_type().as_byte());
        target.write_utf(op.segment())?;
        if let Operation::Append { offset, data, .. } = op {
            target.write_u64(*offset);
            target.write_bytes(data)?;
        }
        Ok(())
    }

    fn read00(source: &mut RevisionDataInput<'_>, b: &mut OperationBuilder) -> WireResult<()> {
        let type_byte = source.read_u8()?;
        let operation_type = OperationType::from_byte(type_byte).ok_or_else(|| {
            WireError::invalid_data(format!("unknown operation type {type_byte}"))
        })?;
        b.operation_type = Some(operation_type);
        b.segment = Some(source.read_utf()?);
        if operation_type == OperationType::Append {
            b.offset = source.read_u64()?;
            b.data = source.read_bytes()?;
        }
        Ok(())
    }
}

impl VersionedSerializer for OperationSerializer {
    type Item = Operation;
    type Builder = OperationBuilder;

    fn write_version(&self) -> u8 {
        0
    }

    fn declare_versions(&self) -> Vec<FormatVersion<Operation, OperationBuilder>> {
        vec![FormatVersion::new(0).revision(0, Self::write00, Self::read00)]
    }

    fn new_builder(&self) -> OperationBuilder {
        OperationBuilder::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_type_from_byte() {
        assert_eq!(OperationType::from_byte(2), Some(OperationType::Append));
        assert_eq!(OperationType::from_byte(0), None);
        assert_eq!(OperationType::Delete.as_byte(), 4);
    }

    #[test]
    fn append_keeps_offset_and_data() {
        let op = Operation::Append {
            segment: "s".into(),
            offset: 10,
            data: vec![1, 2, 3],
        };
        let bytes = OperationSerializer.serialize(&op).unwrap();
        assert_eq!(OperationSerializer.deserialize(&bytes).unwrap(), op);
    }

    #[test]
    fn unknown_operation_type_rejected() {
        let op = Operation::Seal {
            segment: "s".into(),
        };
        let mut bytes = OperationSerializer.serialize(&op).unwrap();
        // version, count, revision id, 4-byte length, then the type byte
        bytes[7] = 99;
        assert!(matches!(
            OperationSerializer.deserialize(&bytes),
            Err(WireError::InvalidData { .. })
        ));
    }
}
