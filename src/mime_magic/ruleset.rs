//! Decoding of single magic file lines into [`Rule`]s
//!
//! A rule line looks like
//!
//! ```text
//! >2	string	OK	image/x-test-ok	us-ascii
//! ```
//!
//! Fields are separated by a tab or by any run of two or more whitespace
//! characters, so a lone space may appear inside a value. Lines are
//! handled as raw bytes; only the type keyword and numbers need to be
//! ASCII.

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag_no_case, take_while1, take_while_m_n};
use nom::character::complete::{alpha1, char, digit0, digit1, hex_digit1, one_of, space0, space1};
use nom::combinator::{all_consuming, map, map_opt, map_res, opt, recognize};
use nom::multi::fold_many0;
use nom::number::complete::be_u8;
use nom::sequence::{pair, preceded};
use nom::IResult;

use super::{Rule, TestType};
use crate::error::{MagicError, Result};

/// A rule line split into its fields, before any value decoding
struct Fields<'a> {
	continuation: bool,
	offset: u64,
	test_type: TestType,
	value: &'a [u8],
	label: Option<&'a [u8]>,
	charset: Option<&'a [u8]>,
}

// Value of an ASCII digit run. None on overflow.
fn from_radix(digits: &[u8], radix: u32) -> Option<u64> {
	digits.iter().try_fold(0u64, |acc, &d| {
		let d = (d as char).to_digit(radix)?;
		acc.checked_mul(u64::from(radix))?.checked_add(u64::from(d))
	})
}

// A single '>' marks a continuation line
fn continuation_marker(input: &[u8]) -> IResult<&[u8], bool> {
	map(opt(char('>')), |marker| marker.is_some())(input)
}

fn start_offset(input: &[u8]) -> IResult<&[u8], u64> {
	map_opt(digit1, |s: &[u8]| from_radix(s, 10))(input)
}

fn test_type(input: &[u8]) -> IResult<&[u8], TestType> {
	map_opt(alpha1, |s: &[u8]| {
		std::str::from_utf8(s).ok().and_then(TestType::from_keyword)
	})(input)
}

fn field(input: &[u8]) -> IResult<&[u8], &[u8]> {
	is_not("\t")(input)
}

fn rule_fields(input: &[u8]) -> IResult<&[u8], Fields<'_>> {
	let (input, continuation) = continuation_marker(input)?;
	let (input, offset) = start_offset(input)?;
	let (input, _) = space0(input)?;
	let (input, test_type) = test_type(input)?;
	let (input, _) = space1(input)?;
	let (input, value) = field(input)?;
	let (input, label) = opt(preceded(char('\t'), field))(input)?;

	// charset only ever follows a label
	let (input, charset) = match label {
		Some(_) => opt(preceded(char('\t'), field))(input)?,
		None => (input, None),
	};

	Ok((input, Fields {
		continuation,
		offset,
		test_type,
		value,
		label,
		charset,
	}))
}

/// Whether a raw line refines the rule above it.
pub fn is_continuation(line: &[u8]) -> bool {
	line.first() == Some(&b'>')
}

fn is_blank(b: u8) -> bool {
	b.is_ascii_whitespace() || b == 0x0b
}

/// Drop the line terminator and fold every run of two or more
/// whitespace characters into one tab.
pub fn normalize(line: &[u8]) -> Vec<u8> {
	let end = line.iter()
		.rposition(|&b| b != b'\n' && b != b'\r')
		.map_or(0, |i| i + 1);
	let mut out = Vec::with_capacity(end);
	let mut run = 0usize;
	let mut first = b' ';

	for &b in &line[..end] {
		if is_blank(b) {
			if run == 0 {
				first = b;
			}
			run += 1;
			continue;
		}

		match run {
			0 => {}
			1 => out.push(first),
			_ => out.push(b'\t'),
		}
		run = 0;
		out.push(b);
	}

	match run {
		0 => {}
		1 => out.push(first),
		_ => out.push(b'\t'),
	}

	out
}

fn decimal(input: &str) -> IResult<&str, u64> {
	map_res(
		recognize(pair(one_of("123456789"), digit0)),
		|s: &str| s.parse::<u64>()
	)(input)
}

fn octal(input: &str) -> IResult<&str, u64> {
	map_res(
		preceded(char('0'), take_while1(|c: char| ('0'..='7').contains(&c))),
		|s: &str| u64::from_str_radix(s, 8)
	)(input)
}

fn hexadecimal(input: &str) -> IResult<&str, u64> {
	map_res(
		preceded(tag_no_case("0x"), hex_digit1),
		|s: &str| u64::from_str_radix(s, 16)
	)(input)
}

/// Parse a numeric literal as decimal, octal (`0` prefix) or hex (`0x`
/// prefix), in that order. The whole literal has to match one grammar.
pub fn parse_number(literal: &str) -> Result<u64> {
	alt((
		all_consuming(decimal),
		all_consuming(octal),
		all_consuming(hexadecimal),
	))(literal)
		.map(|(_, value)| value)
		.map_err(|_| MagicError::NumberFormat(literal.to_string()))
}

fn escaped(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
	preceded(char('\\'), alt((
		map_opt(
			preceded(char('x'), take_while_m_n(1, 2, |c: u8| c.is_ascii_hexdigit())),
			|s: &[u8]| from_radix(s, 16).map(|v| vec![v as u8])
		),
		map_opt(
			take_while_m_n(1, 3, |c: u8| (b'0'..=b'7').contains(&c)),
			|s: &[u8]| from_radix(s, 8).map(|v| vec![v as u8])
		),
		map(be_u8, |c| vec![match c {
			b'n' => b'\n',
			b't' => b'\t',
			b'r' => b'\r',
			b'a' => 0x07,
			b'v' => 0x0b,
			b'b' => 0x08,
			b'f' => 0x0c,
			other => other,
		}]),
	)))(input)
}

fn literal(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
	map(is_not("\\"), |s: &[u8]| s.to_vec())(input)
}

/// Decode C-style backslash escapes into raw bytes.
///
/// A backslash at the very end of the input is dropped.
pub fn unescape(input: &[u8]) -> Vec<u8> {
	let result: IResult<&[u8], Vec<u8>> = fold_many0(
		alt((literal, escaped)),
		Vec::new,
		|mut acc: Vec<u8>, bytes| {
			acc.extend(bytes);
			acc
		}
	)(input);

	match result {
		Ok((_, bytes)) => bytes,
		Err(_) => Vec::new(),
	}
}

fn number(raw: &[u8]) -> Result<u64> {
	parse_number(&String::from_utf8_lossy(raw))
}

fn text(raw: &[u8]) -> String {
	String::from_utf8_lossy(raw).into_owned()
}

/// Decode one line of a magic file.
///
/// Returns `Ok(None)` when the line does not look like a rule at all.
/// A line that does look like a rule but carries a malformed number is
/// an error.
pub fn decode(line: &[u8]) -> Result<Option<Rule>> {
	let line = normalize(line);
	let fields = match all_consuming(rule_fields)(&line[..]) {
		Ok((_, fields)) => fields,
		Err(_) => return Ok(None),
	};

	let raw = fields.value;
	let value = match fields.test_type {
		TestType::String => unescape(raw),
		TestType::Short => (number(raw)? as u16).to_ne_bytes().to_vec(),
		TestType::BeShort => (number(raw)? as u16).to_be_bytes().to_vec(),
		TestType::LeShort => (number(raw)? as u16).to_le_bytes().to_vec(),
		TestType::Long => (number(raw)? as u32).to_ne_bytes().to_vec(),
		TestType::BeLong => (number(raw)? as u32).to_be_bytes().to_vec(),
		TestType::LeLong => (number(raw)? as u32).to_le_bytes().to_vec(),
		TestType::Byte | TestType::Date | TestType::BeDate | TestType::LeDate => {
			raw.to_vec()
		}
	};

	Ok(Some(Rule {
		continuation: fields.continuation,
		offset: fields.offset,
		test_type: fields.test_type,
		value,
		label: fields.label.map(text),
		charset: fields.charset.map(text),
	}))
}
