//! Read magic file bundled in crate

use std::io::Cursor;
use super::source::RuleSource;
use crate::error::Result;

/// Raw text of the bundled magic file.
pub static MAGIC: &[u8] = include_bytes!("magic");

pub type Source = RuleSource<Cursor<&'static [u8]>>;

/// Fresh cursor over the bundled rules. Cheap; nothing is decoded up front.
pub fn source() -> Result<Source> {
	RuleSource::new(Cursor::new(MAGIC))
}
