//! Field-level access to a decoded metadata block

use std::fmt;

use crate::{
    codec::MetadataCodec,
    error::Result,
    fields::{self, Field, FIELDS},
    tiff::{ExifData, ExifInfo, Ifd, TiffCodec, Value},
};

/// A decoded metadata block together with the codec that owns its format
///
/// Reads return `Ok(None)` for a field the block does not contain; only a
/// name missing from the field table is an error. Every mutation marks
/// the block dirty until [`Metadata::mark_clean`] is called.
///
/// # Example
///
/// ```
/// use exif_io::Metadata;
///
/// # fn main() -> exif_io::Result<()> {
/// let mut metadata = Metadata::empty();
/// assert_eq!(metadata.read_text("Artist")?, None);
///
/// metadata.write_text("Artist", "Jane Doe")?;
/// assert_eq!(metadata.read_text("Artist")?.as_deref(), Some("Jane Doe"));
/// assert!(metadata.is_dirty());
/// # Ok(())
/// # }
/// ```
pub struct Metadata<C: MetadataCodec = TiffCodec> {
    codec: C,
    block: C::Block,
    dirty: bool,
}

impl<C: MetadataCodec> Metadata<C> {
    /// Decode `bytes` with `codec`
    pub fn open_with(codec: C, bytes: &[u8]) -> Result<Self> {
        let block = codec.decode(bytes)?;
        Ok(Self::from_block(codec, block))
    }

    /// Start from an empty block
    pub fn empty_with(codec: C) -> Self {
        let block = codec.empty();
        Self::from_block(codec, block)
    }

    /// Wrap an already decoded block
    pub fn from_block(codec: C, block: C::Block) -> Self {
        Self {
            codec,
            block,
            dirty: false,
        }
    }

    /// Codec used to encode and decode the block
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Decoded block, read-only
    pub fn block(&self) -> &C::Block {
        &self.block
    }

    /// Mutable access to the block; marks it dirty
    pub fn block_mut(&mut self) -> &mut C::Block {
        self.dirty = true;
        &mut self.block
    }

    /// Value of the named field in the group listed in [`fields::FIELDS`]
    ///
    /// Entries stored in any other group are only visible through
    /// [`Metadata::get_field_in`].
    pub fn get_field(&self, name: &str) -> Result<Option<Value>> {
        let field = fields::resolve(name)?;
        Ok(self.codec.get(&self.block, field.ifd, field.tag))
    }

    /// Value of the named field's tag within `ifd`
    pub fn get_field_in(&self, ifd: Ifd, name: &str) -> Result<Option<Value>> {
        let field = fields::resolve(name)?;
        Ok(self.codec.get(&self.block, ifd, field.tag))
    }

    /// Value of an arbitrary tag
    pub fn get_value(&self, ifd: Ifd, tag: u16) -> Option<Value> {
        self.codec.get(&self.block, ifd, tag)
    }

    /// Display text of the named field
    pub fn read_text(&self, name: &str) -> Result<Option<String>> {
        let field = fields::resolve(name)?;
        Ok(self
            .codec
            .get(&self.block, field.ifd, field.tag)
            .map(|value| field.to_text(&value)))
    }

    /// Create or replace the named field's entry in `ifd`
    ///
    /// The value is stored as given; use [`Value::undefined`] for untyped bytes.
    /// A later [`Metadata::get_field`] sees it only when `ifd` is the field's
    /// listed group.
    pub fn set_field(&mut self, ifd: Ifd, name: &str, value: Value) -> Result<()> {
        let field = fields::resolve(name)?;
        self.set_value(ifd, field.tag, value);
        Ok(())
    }

    /// Store raw bytes for the named field with the untyped encoding
    pub fn set_bytes(&mut self, ifd: Ifd, name: &str, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.set_field(ifd, name, Value::undefined(bytes))
    }

    /// Create or replace an arbitrary tag
    pub fn set_value(&mut self, ifd: Ifd, tag: u16, value: Value) {
        self.codec.set(&mut self.block, ifd, tag, value);
        self.dirty = true;
    }

    /// Convert `text` to the field's type and store it; empty text removes the field
    pub fn write_text(&mut self, name: &str, text: &str) -> Result<()> {
        let field = fields::resolve(name)?;
        match field.parse_text(text)? {
            Some(value) => self.set_value(field.ifd, field.tag, value),
            None => {
                self.remove_entry(field);
            }
        }
        Ok(())
    }

    /// Remove the named field, returning whether it was present
    pub fn remove_field(&mut self, name: &str) -> Result<bool> {
        let field = fields::resolve(name)?;
        Ok(self.remove_entry(field))
    }

    fn remove_entry(&mut self, field: &Field) -> bool {
        let removed = self.codec.remove(&mut self.block, field.ifd, field.tag);
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Serialize the block into an APP1 payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.codec.encode(&self.block)
    }

    /// Check for changes since open or the last [`Metadata::mark_clean`]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag after the block has been written out
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Raw bytes of the embedded thumbnail, if present
    pub fn thumbnail(&self) -> Option<&[u8]> {
        self.codec.thumbnail(&self.block)
    }

    /// Every known field with its current value
    pub fn fields(&self) -> impl Iterator<Item = (&'static Field, Option<Value>)> + '_ {
        FIELDS
            .iter()
            .map(move |field| (field, self.codec.get(&self.block, field.ifd, field.tag)))
    }
}

impl Metadata<TiffCodec> {
    /// Decode an EXIF APP1 segment or payload
    pub fn open(bytes: &[u8]) -> Result<Self> {
        Self::open_with(TiffCodec, bytes)
    }

    /// An empty EXIF block
    pub fn empty() -> Self {
        Self::empty_with(TiffCodec)
    }

    /// Summary of the common descriptive tags
    pub fn info(&self) -> ExifInfo {
        self.block.info()
    }

    pub fn exif(&self) -> &ExifData {
        &self.block
    }
}

impl Default for Metadata<TiffCodec> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<C> fmt::Debug for Metadata<C>
where
    C: MetadataCodec + fmt::Debug,
    C::Block: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("codec", &self.codec)
            .field("block", &self.block)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl<C> Clone for Metadata<C>
where
    C: MetadataCodec + Clone,
    C::Block: Clone,
{
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            block: self.block.clone(),
            dirty: self.dirty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, test_utils::sample_exif_payload, tiff::tags};

    #[test]
    fn test_get_field_present_and_absent() {
        let metadata = Metadata::open(&sample_exif_payload()).unwrap();
        assert_eq!(metadata.read_text("Make").unwrap().as_deref(), Some("Canon"));
        assert_eq!(
            metadata.read_text("DateTimeOriginal").unwrap().as_deref(),
            Some("2017:01:02 03:04:05")
        );
        assert_eq!(metadata.get_field("Model").unwrap(), None);
        assert!(matches!(
            metadata.get_field("NoSuchField"),
            Err(Error::UnknownField(_))
        ));
        assert!(!metadata.is_dirty());
    }

    #[test]
    fn test_empty_block_has_no_fields() {
        let metadata = Metadata::empty();
        assert!(metadata.fields().all(|(_, value)| value.is_none()));
    }

    #[test]
    fn test_set_field_twice_keeps_one_entry() {
        let mut metadata = Metadata::empty();
        let value = Value::ascii("Leica");
        metadata.set_field(Ifd::Ifd0, "Make", value.clone()).unwrap();
        metadata.set_field(Ifd::Ifd0, "Make", value.clone()).unwrap();

        assert_eq!(metadata.get_field("Make").unwrap(), Some(value));
        assert_eq!(metadata.exif().entries(Ifd::Ifd0).count(), 1);
        assert!(metadata.is_dirty());
    }

    #[test]
    fn test_set_bytes_uses_undefined() {
        let mut metadata = Metadata::empty();
        metadata.set_bytes(Ifd::Exif, "Model", b"raw".to_vec()).unwrap();
        assert_eq!(
            metadata.get_field_in(Ifd::Exif, "Model").unwrap(),
            Some(Value::Undefined(b"raw".to_vec()))
        );
        assert_eq!(metadata.get_field("Model").unwrap(), None);
    }

    #[test]
    fn test_write_text_and_remove() {
        let mut metadata = Metadata::open(&sample_exif_payload()).unwrap();
        metadata.write_text("FNumber", "2.8").unwrap();
        assert_eq!(
            metadata.get_value(Ifd::Exif, tags::F_NUMBER),
            Some(Value::Rational(vec![(14, 5)]))
        );
        assert_eq!(metadata.read_text("FNumber").unwrap().as_deref(), Some("14/5"));

        metadata.write_text("Make", "").unwrap();
        assert_eq!(metadata.get_field("Make").unwrap(), None);
        assert!(!metadata.remove_field("Make").unwrap());
        assert!(metadata.remove_field("Orientation").unwrap());
    }

    #[test]
    fn test_invalid_text_leaves_block_clean() {
        let mut metadata = Metadata::open(&sample_exif_payload()).unwrap();
        assert!(metadata.write_text("DateTimeOriginal", "yesterday").is_err());
        assert!(!metadata.is_dirty());
        assert_eq!(
            metadata.read_text("DateTimeOriginal").unwrap().as_deref(),
            Some("2017:01:02 03:04:05")
        );
    }

    #[test]
    fn test_encode_after_edit() {
        let mut metadata = Metadata::open(&sample_exif_payload()).unwrap();
        metadata.write_text("Artist", "Jane").unwrap();
        let reopened = Metadata::open(&metadata.encode().unwrap()).unwrap();
        assert_eq!(reopened.read_text("Artist").unwrap().as_deref(), Some("Jane"));
        assert_eq!(reopened.read_text("Make").unwrap().as_deref(), Some("Canon"));
        assert_eq!(reopened.thumbnail(), Some(&[0xFF, 0xD8, 0xFF, 0xD9][..]));

        metadata.mark_clean();
        assert!(!metadata.is_dirty());
    }
}
