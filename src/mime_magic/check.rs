use std::io::{BufRead, Read, Seek, SeekFrom};
use log::{debug, trace};
use super::source::RuleSource;
use super::{ruleset, Outcome, Rule};
use crate::error::Result;

/// Compare the rule's value against the target at the rule's offset.
///
/// Running out of file, before or inside the compared region, is a
/// plain mismatch.
pub fn evaluate<F: Read + Seek>(rule: &Rule, file: &mut F) -> Result<bool> {

	// Check if we're even in bounds
	let end = file.seek(SeekFrom::End(0))?;
	if rule.offset >= end {
		return Ok(false);
	}

	file.seek(SeekFrom::Start(rule.offset))?;
	let mut found = Vec::<u8>::with_capacity(rule.value.len());
	file.by_ref()
		.take(rule.value.len() as u64)
		.read_to_end(&mut found)?;

	Ok(found == rule.value)
}

/// Try the rule under the cursor. A matching top-level rule then lets
/// the continuation lines below it refine the result.
///
/// On return the cursor sits on the first line this rule did not
/// consume. For a matching top-level rule that is the start of the next
/// top-level rule.
pub fn parse<R, F>(source: &mut RuleSource<R>, file: &mut F) -> Result<Outcome>
where
	R: BufRead + Seek,
	F: Read + Seek,
{
	let mark = source.position();
	let decoded = match source.current() {
		Some(line) => ruleset::decode(line)?,
		None => return Ok(Outcome::NoMatch),
	};
	source.advance()?;

	let rule = match decoded {
		Some(rule) => rule,
		None => {
			debug!("line at byte {} is not a rule, ignoring it", mark.offset());
			return Ok(Outcome::NoMatch);
		}
	};

	if !rule.test_type.is_supported() {
		debug!("{:?} tests are not supported, skipping rule", rule.test_type);
		return Ok(Outcome::NoMatch);
	}

	if !evaluate(&rule, file)? {
		return Ok(Outcome::NoMatch);
	}
	trace!("rule at offset {} ({:?}) matched", rule.offset, rule.test_type);

	let mut label = rule.result_label();
	if !rule.continuation {
		if let Some(refined) = refine(source, file)? {
			label = Some(refined);
		}
	}

	match label {
		Some(label) => Ok(Outcome::Match(label)),
		None => Ok(Outcome::NoMatch),
	}
}

/// Walk the continuation block following a matched rule. The first
/// continuation that matches wins and the rest of the block is skipped.
fn refine<R, F>(source: &mut RuleSource<R>, file: &mut F) -> Result<Option<String>>
where
	R: BufRead + Seek,
	F: Read + Seek,
{
	loop {
		let mark = source.position();
		match source.current() {
			Some(line) if ruleset::is_continuation(line) => {}
			// Not ours; leave it for the caller
			_ => return Ok(None),
		}

		match parse(source, file)? {
			Outcome::Match(label) => {
				debug!("refined to {} by continuation at byte {}", label, mark.offset());
				skip_block(source)?;
				return Ok(Some(label));
			}
			Outcome::NoMatch => {
				source.restore(mark)?;
				source.advance()?;
			}
		}
	}
}

/// Move past every remaining continuation line.
fn skip_block<R: BufRead + Seek>(source: &mut RuleSource<R>) -> Result<()> {
	while let Some(line) = source.current() {
		if !ruleset::is_continuation(line) {
			break;
		}
		source.advance()?;
	}
	Ok(())
}

/// Run every top-level rule in turn until one matches.
pub fn from_source<R, F>(source: &mut RuleSource<R>, file: &mut F) -> Result<Outcome>
where
	R: BufRead + Seek,
	F: Read + Seek,
{
	source.rewind()?;

	loop {
		let continuation = match source.current() {
			Some(line) => ruleset::is_continuation(line),
			None => return Ok(Outcome::NoMatch),
		};

		// Children of a rule that did not match
		if continuation {
			trace!("skipping continuation at byte {}", source.position().offset());
			source.advance()?;
			continue;
		}

		if let Outcome::Match(label) = parse(source, file)? {
			return Ok(Outcome::Match(label));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{self, Cursor};
	use crate::error::MagicError;
	use crate::mime_magic::TestType;

	fn source(text: &'static str) -> RuleSource<Cursor<&'static str>> {
		RuleSource::new(Cursor::new(text)).unwrap()
	}

	fn rule(offset: u64, test_type: TestType, value: &[u8]) -> Rule {
		Rule {
			continuation: false,
			offset,
			test_type,
			value: value.to_vec(),
			label: Some("x/y".to_string()),
			charset: None,
		}
	}

	#[test]
	fn evaluate_compares_at_offset() {
		let mut file = Cursor::new(b"\x12\x34OK".to_vec());
		assert!(evaluate(&rule(0, TestType::BeShort, &[0x12, 0x34]), &mut file).unwrap());
		assert!(evaluate(&rule(2, TestType::String, b"OK"), &mut file).unwrap());
		assert!(!evaluate(&rule(2, TestType::String, b"NO"), &mut file).unwrap());
		assert!(!evaluate(&rule(1, TestType::String, b"OK"), &mut file).unwrap());
	}

	#[test]
	fn evaluate_is_false_at_or_past_eof() {
		let types = [
			TestType::Byte, TestType::String, TestType::Short, TestType::BeShort,
			TestType::LeShort, TestType::Long, TestType::BeLong, TestType::LeLong,
		];
		let mut file = Cursor::new(b"abcd".to_vec());
		for &t in types.iter() {
			assert!(!evaluate(&rule(4, t, b"a"), &mut file).unwrap());
			assert!(!evaluate(&rule(100, t, b"a"), &mut file).unwrap());
			// even an empty value does not match past the end
			assert!(!evaluate(&rule(4, t, b""), &mut file).unwrap());
		}

		let mut empty = Cursor::new(Vec::new());
		assert!(!evaluate(&rule(0, TestType::String, b""), &mut empty).unwrap());
	}

	#[test]
	fn evaluate_short_read_is_no_match() {
		let mut file = Cursor::new(b"ab".to_vec());
		assert!(!evaluate(&rule(1, TestType::String, b"bcd"), &mut file).unwrap());
	}

	struct Broken;

	impl Read for Broken {
		fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
			Err(io::Error::new(io::ErrorKind::Other, "bad sector"))
		}
	}

	impl Seek for Broken {
		fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
			Ok(16)
		}
	}

	#[test]
	fn evaluate_surfaces_io_errors() {
		match evaluate(&rule(0, TestType::String, b"a"), &mut Broken) {
			Err(MagicError::Io(_)) => {}
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn childless_rule_leaves_cursor_on_next_line() {
		let mut magic = source("0\tstring\tAB\ta/b\n1\tstring\tB\tb/b\n");
		let mut file = Cursor::new(b"AB".to_vec());
		assert_eq!(parse(&mut magic, &mut file).unwrap(), Outcome::Match("a/b".to_string()));
		assert_eq!(magic.current(), Some(&b"1\tstring\tB\tb/b\n"[..]));
	}

	#[test]
	fn second_sibling_refines() {
		let mut magic = source(concat!(
			"0\tbeshort\t0x1234\timage/x-test\n",
			">2\tstring\tNO\timage/x-test-no\n",
			">garbage\n",
			">2\tstring\tOK\timage/x-test-ok\n",
			">2\tstring\tXX\timage/x-test-xx\n",
			"0\tstring\tZ\tz/z\n",
		));
		let mut file = Cursor::new(b"\x12\x34OK".to_vec());
		assert_eq!(
			parse(&mut magic, &mut file).unwrap(),
			Outcome::Match("image/x-test-ok".to_string())
		);
		assert_eq!(magic.current(), Some(&b"0\tstring\tZ\tz/z\n"[..]));
	}

	#[test]
	fn failed_children_keep_parent_label() {
		let mut magic = source(concat!(
			"0\tbeshort\t0x1234\timage/x-test\n",
			">2\tstring\tOK\timage/x-test-ok\n",
			">2\tledate\t1\tx/date\n",
			"# trailing comment\n",
			"0\tstring\tZ\tz/z\n",
		));
		let mut file = Cursor::new(b"\x12\x34NO".to_vec());
		assert_eq!(
			parse(&mut magic, &mut file).unwrap(),
			Outcome::Match("image/x-test".to_string())
		);
		assert_eq!(magic.current(), Some(&b"0\tstring\tZ\tz/z\n"[..]));
	}

	#[test]
	fn non_matching_rule_does_not_consume_children() {
		let mut magic = source("0\tstring\tQ\tq/q\n>1\tstring\tR\tr/r\n");
		let mut file = Cursor::new(b"AR".to_vec());
		assert_eq!(parse(&mut magic, &mut file).unwrap(), Outcome::NoMatch);
		assert_eq!(magic.current(), Some(&b">1\tstring\tR\tr/r\n"[..]));
	}

	#[test]
	fn only_top_level_rules_refine() {
		let text = concat!(
			"0\tstring\tA\ta/a\n",
			">1\tstring\tX\ta/x\n",
			">>2\tstring\tC\ta/xc\n",
			">1\tstring\tB\ta/b\n",
			">>2\tstring\tC\ta/bc\n",
			">2\tstring\tC\ta/c\n",
			"0\tstring\tZ\tz/z\n",
		);

		// a matching child is final, and double markers are never rules
		let mut magic = source(text);
		let mut file = Cursor::new(b"ABC".to_vec());
		assert_eq!(parse(&mut magic, &mut file).unwrap(), Outcome::Match("a/b".to_string()));
		assert_eq!(magic.current(), Some(&b"0\tstring\tZ\tz/z\n"[..]));

		let mut magic = source(text);
		let mut file = Cursor::new(b"AXC".to_vec());
		assert_eq!(parse(&mut magic, &mut file).unwrap(), Outcome::Match("a/x".to_string()));

		let mut magic = source(text);
		let mut file = Cursor::new(b"AQC".to_vec());
		assert_eq!(parse(&mut magic, &mut file).unwrap(), Outcome::Match("a/c".to_string()));
	}

	#[test]
	fn continuation_rules_do_not_refine_each_other() {
		let mut magic = source(">0\tstring\tA\ta/a\n>1\tstring\tB\ta/b\n");
		let mut file = Cursor::new(b"AB".to_vec());
		assert_eq!(parse(&mut magic, &mut file).unwrap(), Outcome::Match("a/a".to_string()));
		assert_eq!(magic.current(), Some(&b">1\tstring\tB\ta/b\n"[..]));
	}

	#[test]
	fn unlabelled_rules_only_guard() {
		let text = "0\tstring\tA\n>1\tstring\tB\ta/b\n";

		let mut magic = source(text);
		let mut file = Cursor::new(b"AB".to_vec());
		assert_eq!(parse(&mut magic, &mut file).unwrap(), Outcome::Match("a/b".to_string()));

		let mut magic = source(text);
		let mut file = Cursor::new(b"AC".to_vec());
		assert_eq!(parse(&mut magic, &mut file).unwrap(), Outcome::NoMatch);
	}

	#[test]
	fn from_source_skips_orphans_and_garbage() {
		let mut magic = source(concat!(
			"this is not a rule\n",
			"0\tstring\tQ\tq/q\n",
			">0\tstring\tA\tshould/not-match\n",
			"0\tdate\t1\tx/date\n",
			"0\tstring\tA\ta/a\n",
		));
		let mut file = Cursor::new(b"A".to_vec());
		assert_eq!(from_source(&mut magic, &mut file).unwrap(), Outcome::Match("a/a".to_string()));
	}

	#[test]
	fn number_errors_abort_the_lookup() {
		let mut magic = source("0\tbeshort\t08\tx/x\n0\tstring\tA\ta/a\n");
		let mut file = Cursor::new(b"A".to_vec());
		match from_source(&mut magic, &mut file) {
			Err(MagicError::NumberFormat(ref s)) => assert_eq!(s, "08"),
			other => panic!("unexpected {:?}", other),
		}
	}
}
