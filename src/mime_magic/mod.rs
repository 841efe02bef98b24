// Common types for the Apache-style magic parser and matcher

use fnv::FnvHashMap;

/// Kind of comparison a rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestType {
	Byte,
	String,
	Short,
	BeShort,
	LeShort,
	Long,
	BeLong,
	LeLong,
	Date,
	BeDate,
	LeDate,
}

lazy_static! {
	static ref KEYWORDS: FnvHashMap<&'static str, TestType> = {
		let mut out = FnvHashMap::<&'static str, TestType>::default();
		out.insert("byte", TestType::Byte);
		out.insert("string", TestType::String);
		out.insert("short", TestType::Short);
		out.insert("beshort", TestType::BeShort);
		out.insert("leshort", TestType::LeShort);
		out.insert("long", TestType::Long);
		out.insert("belong", TestType::BeLong);
		out.insert("lelong", TestType::LeLong);
		out.insert("date", TestType::Date);
		out.insert("bedate", TestType::BeDate);
		out.insert("ledate", TestType::LeDate);
		out
	};
}

impl TestType {
	/// Look up a type keyword as written in the magic file.
	pub fn from_keyword(keyword: &str) -> Option<TestType> {
		KEYWORDS.get(keyword).copied()
	}

	/// Date tests decode fine but are never evaluated.
	pub fn is_supported(self) -> bool {
		match self {
			TestType::Date | TestType::BeDate | TestType::LeDate => false,
			_ => true,
		}
	}
}

/// One decoded line of a magic file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
	/// Line started with `>`; only tried after the rule above it matched.
	pub continuation: bool,
	pub offset: u64,
	pub test_type: TestType,
	pub value: Vec<u8>,
	pub label: Option<String>,
	pub charset: Option<String>,
}

impl Rule {
	/// The string reported when this rule matches, charset included.
	pub fn result_label(&self) -> Option<String> {
		let label = self.label.as_ref()?;
		Some(match self.charset {
			Some(ref charset) => format!("{}; charset={}", label, charset),
			None => label.clone(),
		})
	}
}

/// Result of trying one rule and its continuation lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	NoMatch,
	Match(String),
}

impl Outcome {
	pub fn into_label(self) -> Option<String> {
		match self {
			Outcome::Match(label) => Some(label),
			Outcome::NoMatch => None,
		}
	}
}

pub mod ruleset;
pub mod source;
pub mod check;
pub mod builtin;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keywords() {
		assert_eq!(TestType::from_keyword("beshort"), Some(TestType::BeShort));
		assert_eq!(TestType::from_keyword("lelong"), Some(TestType::LeLong));
		assert_eq!(TestType::from_keyword("regex"), None);
		assert_eq!(TestType::from_keyword("Short"), None);
		assert!(!TestType::BeDate.is_supported());
		assert!(TestType::Byte.is_supported());
	}

	#[test]
	fn label_with_charset() {
		let mut rule = Rule {
			continuation: false,
			offset: 0,
			test_type: TestType::String,
			value: b"\xef\xbb\xbf".to_vec(),
			label: Some("text/plain".to_string()),
			charset: Some("utf-8".to_string()),
		};
		assert_eq!(rule.result_label(), Some("text/plain; charset=utf-8".to_string()));

		rule.charset = None;
		assert_eq!(rule.result_label(), Some("text/plain".to_string()));

		rule.label = None;
		assert_eq!(rule.result_label(), None);
	}
}
