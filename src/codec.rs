//! Boundary between the container model and the metadata block
//!
//! The container never looks inside the EXIF block. It hands the raw
//! segment bytes to a [`MetadataCodec`], which owns the decoded form and
//! turns it back into an APP1 payload on save.

use crate::{
    error::Result,
    tiff::{Ifd, Value},
};

/// Decode, query, mutate and re-encode a metadata block
pub trait MetadataCodec {
    /// Decoded, codec-owned form of the metadata
    type Block;

    /// A block with no entries, used when a file has no metadata yet
    fn empty(&self) -> Self::Block;

    /// Decode the metadata segment
    ///
    /// `bytes` is the full segment span (marker, length and payload) as
    /// found in the container. Implementations report rejection as
    /// [`crate::Error::MetadataDecodeFailed`].
    fn decode(&self, bytes: &[u8]) -> Result<Self::Block>;

    /// Serialize the block into an APP1 payload for reassembly
    ///
    /// Must be deterministic for a given block state.
    fn encode(&self, block: &Self::Block) -> Result<Vec<u8>>;

    /// Look up the entry `tag` in `ifd`
    fn get(&self, block: &Self::Block, ifd: Ifd, tag: u16) -> Option<Value>;

    /// Create or replace the entry `tag` in `ifd`
    fn set(&self, block: &mut Self::Block, ifd: Ifd, tag: u16, value: Value);

    /// Remove the entry `tag` from `ifd`, returning whether it existed
    fn remove(&self, block: &mut Self::Block, ifd: Ifd, tag: u16) -> bool;

    /// Raw bytes of an embedded thumbnail, if the codec keeps one
    fn thumbnail<'a>(&self, _block: &'a Self::Block) -> Option<&'a [u8]> {
        None
    }
}
