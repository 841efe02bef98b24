//! `magic_mime` is a Rust crate that determines the MIME type of a given file or byte stream
//! using an Apache-style "magic" rule file.
//!
//! # About
//! A magic file is a plain text list of byte tests. Each line says "at this offset the file
//! contains these bytes, so it is this type". Lines starting with `>` are continuations: they
//! are only tried when the line above them matched, and refine its answer (for example
//! telling an ELF shared library apart from an ELF executable).
//!
//! Rules are read straight from the file on every lookup, one line at a time. Nothing is
//! compiled or cached, so a magic file can be edited between lookups.
//!
//! # Features
//! - `string`, `byte`, `short`, `long` tests, with native, big or little endian numbers
//!   written in decimal, octal or hex.
//! - Optional charset column, reported as `type/subtype; charset=name`.
//! - A built-in magic file covering common formats, used by the `from_*` functions.
//! - Bring your own magic file with [`Magic::open`] or [`Magic::from_reader`].
//!
//! # Feature flags
//! `cli`:        Enable building of `mmagic` binary
//!
//! # Example
//! ```rust
//! // Load a GIF file
//! let input: &[u8] = include_bytes!("../tests/image/gif");
//!
//! // Find the MIME type of the GIF
//! let result = magic_mime::from_u8(input);
//! assert_eq!(result, Some("image/gif".to_string()));
//!
//! // Check if the MIME and the file are a match
//! let result = magic_mime::match_u8("image/gif", input);
//! assert_eq!(result, true);
//! ```
//!
//! Using your own rules:
//! ```rust
//! use std::io::Cursor;
//! use magic_mime::Magic;
//!
//! let rules = "0\tbeshort\t0x1234\timage/x-test\n>2\tstring\tOK\timage/x-test-ok\n";
//! let mut magic = Magic::from_reader(Cursor::new(rules))?;
//!
//! assert_eq!(magic.identify_u8(b"\x12\x34OK")?, Some("image/x-test-ok".to_string()));
//! assert_eq!(magic.identify_u8(b"\x12\x34NO")?, Some("image/x-test".to_string()));
//! assert_eq!(magic.identify_u8(b"nothing")?, None);
//! # Ok::<(), magic_mime::MagicError>(())
//! ```

#[macro_use] extern crate lazy_static;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use log::debug;
use mime::Mime;

mod error;
mod mime_magic;

pub use crate::error::{MagicError, Result};
pub use crate::mime_magic::{check, ruleset, source};
pub use crate::mime_magic::{Outcome, Rule, TestType};
pub use crate::mime_magic::source::{Bookmark, RuleSource};

/// File name looked for by [`Magic::from_dir`].
pub const MAGIC_FILE_NAME: &str = "magic";

/// A magic file together with its read cursor.
///
/// Lookups move the cursor, so they need `&mut self`. Use one `Magic` per thread.
pub struct Magic<R> {
    source: RuleSource<R>,
}

impl Magic<Cursor<&'static [u8]>> {
    /// Rules bundled with the crate.
    pub fn builtin() -> Result<Self> {
        Ok(Magic { source: mime_magic::builtin::source()? })
    }
}

impl Magic<BufReader<File>> {
    /// Read rules from a magic file on disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| MagicError::from_open(e, path.to_path_buf()))?;
        debug!("using magic file {}", path.display());
        Magic::from_reader(BufReader::new(file))
    }
}

/// Rules picked by [`Magic::from_dir`]: a magic file on disk, or the
/// built-in ones.
pub enum MagicReader {
    File(BufReader<File>),
    Builtin(Cursor<&'static [u8]>),
}

impl Read for MagicReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            MagicReader::File(r) => r.read(buf),
            MagicReader::Builtin(r) => r.read(buf),
        }
    }
}

impl BufRead for MagicReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            MagicReader::File(r) => r.fill_buf(),
            MagicReader::Builtin(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            MagicReader::File(r) => r.consume(amt),
            MagicReader::Builtin(r) => r.consume(amt),
        }
    }
}

impl Seek for MagicReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            MagicReader::File(r) => r.seek(pos),
            MagicReader::Builtin(r) => r.seek(pos),
        }
    }
}

impl Magic<MagicReader> {
    /// Use `<dir>/magic`, or the built-in rules if there is no such file.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(MAGIC_FILE_NAME);

        if !path.is_file() {
            debug!("{} not found, using built-in magic", path.display());
            return Magic::from_reader(MagicReader::Builtin(Cursor::new(mime_magic::builtin::MAGIC)));
        }

        let file = File::open(&path)
            .map_err(|e| MagicError::from_open(e, path.clone()))?;
        debug!("using magic file {}", path.display());
        Magic::from_reader(MagicReader::File(BufReader::new(file)))
    }
}

impl<R: BufRead + Seek> Magic<R> {
    /// Read rules from any seekable text source.
    pub fn from_reader(reader: R) -> Result<Self> {
        Ok(Magic { source: RuleSource::new(reader)? })
    }

    /// Gets the type of a seekable byte source.
    ///
    /// Returns the label of the first top-level rule that matches, refined by its
    /// continuation lines, or `None` if no rule matches.
    ///
    /// # Errors
    /// I/O errors on either side abort the lookup, as does a rule with a malformed
    /// number in it.
    pub fn identify<F: Read + Seek>(&mut self, file: &mut F) -> Result<Option<String>> {
        let outcome = check::from_source(&mut self.source, file)?;
        Ok(outcome.into_label())
    }

    /// Gets the type of a byte stream.
    pub fn identify_u8(&mut self, bytes: &[u8]) -> Result<Option<String>> {
        self.identify(&mut Cursor::new(bytes))
    }

    /// Gets the type of a file from a filepath.
    ///
    /// Does not look at file name or extension, just the contents.
    pub fn identify_path<P: AsRef<Path>>(&mut self, path: P) -> Result<Option<String>> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .map_err(|e| MagicError::from_open(e, path.to_path_buf()))?;
        self.identify(&mut file)
    }

    /// Like [`identify`](Magic::identify), but as a parsed `Mime`.
    ///
    /// Falls back to `application/octet-stream` when nothing matches or the label
    /// is not a valid MIME type.
    pub fn identify_mime<F: Read + Seek>(&mut self, file: &mut F) -> Result<Mime> {
        let label = self.identify(file)?;
        Ok(to_mime(label))
    }

    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }
}

fn to_mime(label: Option<String>) -> Mime {
    label
        .and_then(|label| label.parse().ok())
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

/// Type and subtype of a label, without parameters
fn essence(label: &str) -> &str {
    label.split(';').next().unwrap_or("").trim()
}

/// Gets the type of a file from a byte stream, using the built-in rules.
///
/// Returns the MIME type wrapped in `Some`, or `None` if no rule matches.
///
/// # Examples
/// ```rust
/// // Load a GIF file
/// let input: &[u8] = include_bytes!("../tests/image/gif");
///
/// // Find the MIME type of the GIF
/// let result = magic_mime::from_u8(input);
/// assert_eq!(result, Some("image/gif".to_string()));
/// ```
pub fn from_u8(bytes: &[u8]) -> Option<String> {
    match Magic::builtin().and_then(|mut magic| magic.identify_u8(bytes)) {
        Ok(label) => label,
        Err(e) => {
            debug!("built-in lookup failed: {}", e);
            None
        }
    }
}

/// Like [`from_u8`], as a `Mime`. Unknown data is `application/octet-stream`.
pub fn from_u8_mime(bytes: &[u8]) -> Mime {
    to_mime(from_u8(bytes))
}

/// Gets the type of a file from a filepath, using the built-in rules.
///
/// # Examples
/// ```rust
/// use std::path::Path;
///
/// // Get path to a GIF file
/// let path: &Path = Path::new("tests/image/gif");
///
/// // Find the MIME type of the GIF
/// let result = magic_mime::from_filepath(path).unwrap();
/// assert_eq!(result, Some("image/gif".to_string()));
/// ```
pub fn from_filepath(filepath: &Path) -> Result<Option<String>> {
    Magic::builtin()?.identify_path(filepath)
}

/// Checks if the given bytestream matches the given MIME type.
///
/// Parameters such as `charset` are ignored on both sides.
///
/// # Examples
/// ```rust
/// let input: &[u8] = b"\xef\xbb\xbfhello";
///
/// assert!(magic_mime::match_u8("text/plain", input));
/// assert!(!magic_mime::match_u8("image/gif", input));
/// ```
pub fn match_u8(mimetype: &str, bytes: &[u8]) -> bool {
    match from_u8(bytes) {
        Some(label) => essence(&label).eq_ignore_ascii_case(essence(mimetype)),
        None => false,
    }
}

/// Check if the given filepath matches the given MIME type.
///
/// Files that cannot be read never match.
pub fn match_filepath(mimetype: &str, filepath: &Path) -> bool {
    match from_filepath(filepath) {
        Ok(Some(label)) => essence(&label).eq_ignore_ascii_case(essence(mimetype)),
        Ok(None) => false,
        Err(e) => {
            debug!("cannot check {}: {}", filepath.display(), e);
            false
        }
    }
}
