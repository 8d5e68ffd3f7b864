//! Open, edit and save a single JPEG file
//!
//! A [`Session`] owns the parsed segment layout and the decoded metadata of
//! one file. File access is a single scoped read on open and a single
//! atomic replace on save; nothing stays open in between.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use crate::{
    codec::MetadataCodec,
    error::{Error, Result},
    formats::{self, jpeg_io::MetadataHandle},
    metadata::Metadata,
    options::{MetadataPolicy, Options},
    structure::Structure,
    tiff::TiffCodec,
};

/// One open JPEG file
///
/// # Example
///
/// ```no_run
/// use exif_io::Session;
///
/// # fn main() -> exif_io::Result<()> {
/// let mut session = Session::open("image.jpg")?;
///
/// if let Some(make) = session.metadata().read_text("Make")? {
///     println!("Camera: {}", make);
/// }
///
/// session.metadata_mut().write_text("Artist", "Jane Doe")?;
/// session.save_as("edited.jpg")?;
/// # Ok(())
/// # }
/// ```
pub struct Session<C: MetadataCodec = TiffCodec> {
    path: Option<PathBuf>,
    structure: Structure,
    metadata: Metadata<C>,
}

impl Session<TiffCodec> {
    /// Open a file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(TiffCodec, path, Options::default())
    }

    /// Open a file with the given options
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        Self::open_with(TiffCodec, path, options)
    }

    /// Parse an in-memory file with default options
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with(TiffCodec, data, Options::default())
    }
}

impl<C: MetadataCodec> Session<C> {
    /// Open a file, decoding its metadata with `codec`
    pub fn open_with<P: AsRef<Path>>(codec: C, path: P, options: Options) -> Result<Self> {
        let path = path.as_ref();

        let size = fs::metadata(path)?.len();
        check_size(size, &options)?;

        let data = fs::read(path)?;
        let mut session = Self::from_bytes_with(codec, &data, options)?;
        session.path = Some(path.to_path_buf());

        info!(
            "opened {} ({} bytes, {} segments, metadata: {})",
            path.display(),
            data.len(),
            session.structure.segments.len(),
            if session.structure.has_metadata() { "yes" } else { "no" }
        );
        Ok(session)
    }

    /// Parse an in-memory file, decoding its metadata with `codec`
    ///
    /// The session has no path; use [`Session::save_as`] to write it.
    pub fn from_bytes_with(codec: C, data: &[u8], options: Options) -> Result<Self> {
        check_size(data.len() as u64, &options)?;

        let handler = formats::get_handler(data)?;
        let parsed = handler.parse_with(data, &codec)?;

        let metadata = match parsed.metadata {
            MetadataHandle::Absent => Metadata::empty_with(codec),
            MetadataHandle::Decoded(block) => Metadata::from_block(codec, block),
            MetadataHandle::Failed(err) => match options.policy() {
                MetadataPolicy::Strict => return Err(err),
                MetadataPolicy::Discard => {
                    warn!("discarding undecodable EXIF segment: {}", err);
                    Metadata::empty_with(codec)
                }
            },
        };

        Ok(Self {
            path: None,
            structure: parsed.structure,
            metadata,
        })
    }

    /// Path the session was opened from or last saved to
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn metadata(&self) -> &Metadata<C> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata<C> {
        &mut self.metadata
    }

    /// Check for unsaved metadata changes
    pub fn is_dirty(&self) -> bool {
        self.metadata.is_dirty()
    }

    /// Encode the metadata and reassemble the complete file
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = self.metadata.encode()?;
        self.structure.reassemble(&payload)
    }

    /// Write back to the path the session was opened from
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or(Error::NoPath)?;
        self.write_file(&path)
    }

    /// Write to `path`, which becomes the session's path
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.write_file(path)?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Replace `path` atomically with the reassembled file
    ///
    /// The session is only updated once the new file is in place.
    fn write_file(&mut self, path: &Path) -> Result<()> {
        let data = self.to_bytes()?;
        let structure = formats::get_handler(&data)?.parse(&data)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&data)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        debug!("replaced {} via temporary file", path.display());
        info!("saved {} ({} bytes)", path.display(), data.len());

        self.structure = structure;
        self.metadata.mark_clean();
        Ok(())
    }
}

fn check_size(size: u64, options: &Options) -> Result<()> {
    if size > options.size_limit() {
        return Err(Error::InvalidFormat(format!(
            "File is {} bytes, limit is {}",
            size,
            options.size_limit()
        )));
    }
    Ok(())
}

impl<C> fmt::Debug for Session<C>
where
    C: MetadataCodec + fmt::Debug,
    C::Block: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.path)
            .field("structure", &self.structure)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Holds at most one open [`Session`]
///
/// Opening a file parses it completely before the previous session is
/// released, so a failed open leaves the current file in place.
#[derive(Debug, Default)]
pub struct Editor {
    options: Options,
    session: Option<Session>,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an editor that opens files with `options`
    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            session: None,
        }
    }

    /// Open `path`, replacing the current session on success
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Session> {
        let session = Session::open_with_options(path, self.options)?;
        self.close();
        Ok(self.session.insert(session))
    }

    /// Release the current session, discarding unsaved changes
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if session.is_dirty() {
                warn!("closing with unsaved changes");
            }
            debug!("closed {:?}", session.path());
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    fn current(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(Error::NoSession)
    }

    /// Display text of a field in the open file
    pub fn read_text(&self, name: &str) -> Result<Option<String>> {
        self.session
            .as_ref()
            .ok_or(Error::NoSession)?
            .metadata()
            .read_text(name)
    }

    /// Set a field in the open file from display text
    pub fn write_text(&mut self, name: &str, text: &str) -> Result<()> {
        self.current()?.metadata_mut().write_text(name, text)
    }

    /// Save the open file in place
    pub fn save(&mut self) -> Result<()> {
        self.current()?.save()
    }

    /// Save the open file to `path`
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.current()?.save_as(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixture_bytes, BAD_EXIF, PLAIN, WITH_EXIF};

    #[test]
    fn test_from_bytes_reads_fields() {
        let session = Session::from_bytes(&fixture_bytes(WITH_EXIF).unwrap()).unwrap();
        assert!(session.path().is_none());
        assert!(session.structure().has_metadata());
        assert_eq!(
            session.metadata().read_text("Make").unwrap().as_deref(),
            Some("Canon")
        );
    }

    #[test]
    fn test_unchanged_session_reproduces_input() {
        let data = fixture_bytes(WITH_EXIF).unwrap();
        let session = Session::from_bytes(&data).unwrap();
        let structure = session.structure();
        let payload = structure.metadata_payload().unwrap();
        let verbatim = structure.reassemble(payload).unwrap();
        assert_eq!(verbatim, data);
    }

    #[test]
    fn test_missing_metadata_gets_a_new_block() {
        let mut session = Session::from_bytes(&fixture_bytes(PLAIN).unwrap()).unwrap();
        assert!(!session.structure().has_metadata());
        assert_eq!(session.metadata().get_field("Make").unwrap(), None);

        session.metadata_mut().write_text("Make", "Fuji").unwrap();
        let out = session.to_bytes().unwrap();
        let reopened = Session::from_bytes(&out).unwrap();
        assert_eq!(
            reopened.metadata().read_text("Make").unwrap().as_deref(),
            Some("Fuji")
        );
    }

    #[test]
    fn test_metadata_policy() {
        let data = fixture_bytes(BAD_EXIF).unwrap();
        assert!(matches!(
            Session::from_bytes(&data),
            Err(Error::MetadataDecodeFailed(_))
        ));

        let options = Options::new().metadata_policy(MetadataPolicy::Discard);
        let session = Session::from_bytes_with(TiffCodec, &data, options).unwrap();
        assert!(session.structure().has_metadata());
        assert_eq!(session.metadata().get_field("Make").unwrap(), None);
        assert!(session.to_bytes().is_ok());
    }

    #[test]
    fn test_size_limit() {
        let data = fixture_bytes(PLAIN).unwrap();
        let options = Options::new().max_file_size(10);
        assert!(matches!(
            Session::from_bytes_with(TiffCodec, &data, options),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_save_without_path() {
        let mut session = Session::from_bytes(&fixture_bytes(PLAIN).unwrap()).unwrap();
        assert!(matches!(session.save(), Err(Error::NoPath)));
    }

    #[test]
    fn test_editor_without_session() {
        let mut editor = Editor::new();
        assert!(!editor.is_open());
        assert!(matches!(editor.save(), Err(Error::NoSession)));
        assert!(matches!(editor.read_text("Make"), Err(Error::NoSession)));
        assert!(matches!(
            editor.write_text("Make", "x"),
            Err(Error::NoSession)
        ));
    }
}
