//! Seekable line cursor over a magic file
//!
//! Blank lines and `#` comments are skipped. Lines stay raw bytes, so
//! rule values may hold any byte. Every remaining line is keyed by the
//! byte offset it starts at, which lets the matcher take a
//! [`Bookmark`] before reading ahead and come back to it afterwards.

use std::io::{BufRead, Seek, SeekFrom};
use log::trace;
use crate::error::Result;

/// Byte offset of a line in the magic file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bookmark(u64);

impl Bookmark {
	pub fn offset(self) -> u64 {
		self.0
	}
}

// Empty, whitespace-only, or first non-blank character is '#'
fn is_comment_or_blank(line: &[u8]) -> bool {
	match line.iter().find(|b| !b.is_ascii_whitespace()) {
		Some(&b) => b == b'#',
		None => true,
	}
}

pub struct RuleSource<R> {
	reader: R,
	valid: bool,
	start: u64,
	next: u64,
	buf: Vec<u8>,
}

impl<R: BufRead + Seek> RuleSource<R> {
	/// Wrap a reader and position on its first rule line.
	pub fn new(reader: R) -> Result<RuleSource<R>> {
		let mut source = RuleSource {
			reader,
			valid: false,
			start: 0,
			next: 0,
			buf: Vec::new(),
		};
		source.rewind()?;
		Ok(source)
	}

	/// The line under the cursor, terminator included. `None` once the
	/// file is exhausted.
	pub fn current(&self) -> Option<&[u8]> {
		if self.valid {
			Some(&self.buf[..])
		} else {
			None
		}
	}

	pub fn is_valid(&self) -> bool {
		self.valid
	}

	pub fn position(&self) -> Bookmark {
		Bookmark(self.start)
	}

	/// Move to the next line that is neither blank nor a comment.
	pub fn advance(&mut self) -> Result<()> {
		loop {
			self.start = self.next;
			self.buf.clear();

			let read = self.reader.read_until(b'\n', &mut self.buf)?;
			if read == 0 {
				self.valid = false;
				return Ok(());
			}
			self.next += read as u64;

			if !is_comment_or_blank(&self.buf) {
				self.valid = true;
				return Ok(());
			}
		}
	}

	pub fn rewind(&mut self) -> Result<()> {
		self.seek_line(0)
	}

	/// Put the cursor back on a line seen earlier.
	pub fn restore(&mut self, mark: Bookmark) -> Result<()> {
		trace!("restoring magic cursor to byte {}", mark.0);
		self.seek_line(mark.0)
	}

	fn seek_line(&mut self, offset: u64) -> Result<()> {
		self.reader.seek(SeekFrom::Start(offset))?;
		self.next = offset;
		self.advance()
	}

	pub fn into_inner(self) -> R {
		self.reader
	}
}
