//! Options controlling how files are opened

/// Largest input accepted by default (256 MiB)
pub const MAX_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// What to do when the EXIF segment cannot be decoded
///
/// The container itself parsed fine in either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataPolicy {
    /// Fail the open with [`crate::Error::MetadataDecodeFailed`] (default)
    #[default]
    Strict,
    /// Log a warning and continue with an empty metadata block
    ///
    /// The unreadable segment is replaced by the new block on save.
    Discard,
}

/// Options for opening a file
///
/// Uses a builder pattern; the default is strict decoding and a
/// [`MAX_FILE_SIZE`] input limit.
///
/// # Example
///
/// ```
/// use exif_io::{MetadataPolicy, Options};
///
/// let options = Options::new()
///     .metadata_policy(MetadataPolicy::Discard)
///     .max_file_size(16 * 1024 * 1024);
/// assert_eq!(options.policy(), MetadataPolicy::Discard);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    metadata_policy: MetadataPolicy,
    max_file_size: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            metadata_policy: MetadataPolicy::default(),
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl Options {
    /// Default options: strict metadata policy and [`MAX_FILE_SIZE`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose how an undecodable EXIF segment is handled
    pub fn metadata_policy(mut self, policy: MetadataPolicy) -> Self {
        self.metadata_policy = policy;
        self
    }

    /// Reject inputs larger than `size` bytes
    pub fn max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Selected metadata policy
    pub fn policy(&self) -> MetadataPolicy {
        self.metadata_policy
    }

    /// Largest accepted input size in bytes
    pub fn size_limit(&self) -> u64 {
        self.max_file_size
    }
}
