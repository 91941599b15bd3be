//! Versioned serialization with skippable revisions.
//!
//! ## Format
//!
//! ```text
//! | version (1) | revision count (1) | revision 0 | revision 1 | ... |
//!
//! revision:
//! | revision id (1) | length (4, big-endian) | payload (length) |
//! ```
//!
//! A version declares an ordered list of revisions `0, 1, 2, ...`. Writers
//! emit every revision of their write version. Readers decode the revisions
//! they know and skip the rest using the length prefix, so a reader built
//! against revision 0 can consume data produced by a writer that added
//! revision 1. Each revision is decoded into an incrementally populated
//! [`ObjectBuilder`].

use crate::error::{WireError, WireResult};
use crate::revision::{RevisionDataInput, RevisionDataOutput};

/// An incrementally populated builder for a deserialized object.
pub trait ObjectBuilder {
    /// The type being built.
    type Target;

    /// Finishes building.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::MissingField`] if a required field was never set.
    fn build(self) -> WireResult<Self::Target>;
}

/// Writes one revision of an item.
pub type RevisionWriter<T> = fn(&T, &mut RevisionDataOutput) -> WireResult<()>;

/// Reads one revision into a builder.
pub type RevisionReader<B> = fn(&mut RevisionDataInput<'_>, &mut B) -> WireResult<()>;

/// A single revision within a format version.
pub struct FormatRevision<T, B> {
    revision: u8,
    writer: RevisionWriter<T>,
    reader: RevisionReader<B>,
}

/// A format version and its ordered revisions.
pub struct FormatVersion<T, B> {
    version: u8,
    revisions: Vec<FormatRevision<T, B>>,
}

impl<T, B> FormatVersion<T, B> {
    /// Starts declaring a version.
    pub fn new(version: u8) -> Self {
        Self {
            version,
            revisions: Vec::new(),
        }
    }

    /// Declares the next revision of this version.
    #[must_use]
    pub fn revision(
        mut self,
        revision: u8,
        writer: RevisionWriter<T>,
        reader: RevisionReader<B>,
    ) -> Self {
        self.revisions.push(FormatRevision {
            revision,
            writer,
            reader,
        });
        self
    }

    /// Returns the version number.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the number of declared revisions.
    pub fn revision_count(&self) -> usize {
        self.revisions.len()
    }

    fn validate(&self) -> WireResult<()> {
        if self.revisions.is_empty() {
            return Err(WireError::invalid_declaration(format!(
                "version {} declares no revisions",
                self.version
            )));
        }
        if self.revisions.len() > usize::from(u8::MAX) {
            return Err(WireError::invalid_declaration(format!(
                "version {} declares too many revisions",
                self.version
            )));
        }
        for (expected, declared) in self.revisions.iter().enumerate() {
            if usize::from(declared.revision) != expected {
                return Err(WireError::invalid_declaration(format!(
                    "version {}: expected revision {}, found {}",
                    self.version, expected, declared.revision
                )));
            }
        }
        Ok(())
    }
}

fn find_version<T, B>(
    versions: &[FormatVersion<T, B>],
    version: u8,
) -> WireResult<&FormatVersion<T, B>> {
    let mut found = None;
    for declared in versions {
        if declared.version == version {
            if found.is_some() {
                return Err(WireError::invalid_declaration(format!(
                    "version {version} declared more than once"
                )));
            }
            found = Some(declared);
        }
    }
    let declared = found.ok_or(WireError::UnsupportedVersion { version })?;
    declared.validate()?;
    Ok(declared)
}

/// A serializer with explicit, evolvable versions and revisions.
///
/// Implementors declare their formats; serialization and deserialization are
/// provided.
pub trait VersionedSerializer {
    /// The serialized type.
    type Item;
    /// Builder used while deserializing.
    type Builder: ObjectBuilder<Target = Self::Item>;

    /// Version used when writing.
    fn write_version(&self) -> u8;

    /// Declares every version this serializer can read.
    fn declare_versions(&self) -> Vec<FormatVersion<Self::Item, Self::Builder>>;

    /// Creates an empty builder.
    fn new_builder(&self) -> Self::Builder;

    /// Serializes an item using the write version.
    ///
    /// # Errors
    ///
    /// Returns an error if the declarations are invalid or a field cannot be
    /// encoded.
    fn serialize(&self, item: &Self::Item) -> WireResult<Vec<u8>> {
        let versions = self.declare_versions();
        let version = find_version(&versions, self.write_version())?;

        let mut out = RevisionDataOutput::new();
        out.write_u8(version.version);
        // validate() bounds the revision count to u8
        out.write_u8(version.revisions.len() as u8);

        for revision in &version.revisions {
            let mut payload = RevisionDataOutput::new();
            (revision.writer)(item, &mut payload)?;
            out.write_u8(revision.revision);
            out.write_bytes(&payload.into_bytes())?;
        }

        Ok(out.into_bytes())
    }

    /// Deserializes an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is unknown, the input is truncated,
    /// or the builder cannot produce a complete item.
    fn deserialize(&self, bytes: &[u8]) -> WireResult<Self::Item> {
        let versions = self.declare_versions();
        let mut input = RevisionDataInput::new(bytes);

        let version = find_version(&versions, input.read_u8()?)?;
        let count = input.read_u8()?;
        let mut builder = self.new_builder();

        for expected in 0..count {
            let revision = input.read_u8()?;
            if revision != expected {
                return Err(WireError::invalid_data(format!(
                    "expected revision {expected}, found {revision}"
                )));
            }
            let len = input.read_u32()? as usize;
            let payload = input.take(len)?;

            if let Some(known) = version.revisions.get(usize::from(revision)) {
                let mut section = RevisionDataInput::new(payload);
                (known.reader)(&mut section, &mut builder)?;
            }
        }

        if !input.is_empty() {
            return Err(WireError::invalid_data(format!(
                "{} trailing bytes after last revision",
                input.remaining()
            )));
        }

        builder.build()
    }
}
