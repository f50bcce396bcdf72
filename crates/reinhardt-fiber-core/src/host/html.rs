//! HTML serialization helpers shared by [`super::MemoryHost`] and the server
//! renderer, so both produce byte-identical markup for the same tree.

use std::borrow::Cow;
use std::fmt::Write;

use indexmap::IndexMap;

/// Elements that never have children and are written as `<tag />`.
pub const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
	"wbr",
];

/// HTML boolean attributes: presence alone enables them, so falsy string
/// values must drop the attribute instead of serializing it.
pub const BOOLEAN_ATTRS: &[&str] = &[
	"allowfullscreen",
	"async",
	"autofocus",
	"autoplay",
	"checked",
	"controls",
	"default",
	"defer",
	"disabled",
	"formnovalidate",
	"hidden",
	"inert",
	"ismap",
	"itemscope",
	"loop",
	"multiple",
	"muted",
	"nomodule",
	"novalidate",
	"open",
	"playsinline",
	"readonly",
	"required",
	"reversed",
	"selected",
	"truespeed",
];

/// Whether `tag` is a void element.
pub fn is_void_element(tag: &str) -> bool {
	VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(tag))
}

/// Whether `name` is a boolean attribute.
pub fn is_boolean_attr(name: &str) -> bool {
	BOOLEAN_ATTRS.contains(&name)
}

/// Whether a string value keeps a boolean attribute present.
pub fn is_boolean_attr_truthy(value: &str) -> bool {
	!value.is_empty() && value != "false" && value != "0"
}

fn escape(s: &str, quotes: bool) -> Cow<'_, str> {
	let needs_escape = |c: char| matches!(c, '&' | '<' | '>') || (quotes && matches!(c, '"' | '\''));
	if !s.contains(needs_escape) {
		return Cow::Borrowed(s);
	}
	let mut escaped = String::with_capacity(s.len() + 8);
	for c in s.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' if quotes => escaped.push_str("&quot;"),
			'\'' if quotes => escaped.push_str("&#x27;"),
			_ => escaped.push(c),
		}
	}
	Cow::Owned(escaped)
}

/// Escape text content.
pub fn escape_text(s: &str) -> Cow<'_, str> {
	escape(s, false)
}

/// Escape a double-quoted attribute value.
pub fn escape_attr(s: &str) -> Cow<'_, str> {
	escape(s, true)
}

/// Write `<tag a="b">` (or `<tag a="b" />` for void elements).
///
/// Empty attribute values are written bare (`disabled`), which is how the
/// HTML parser reports them back.
pub fn write_open_tag(out: &mut String, tag: &str, attributes: &IndexMap<String, String>) {
	out.push('<');
	out.push_str(tag);
	for (name, value) in attributes {
		out.push(' ');
		out.push_str(name);
		if !value.is_empty() {
			let _ = write!(out, "=\"{}\"", escape_attr(value));
		}
	}
	if is_void_element(tag) {
		out.push_str(" />");
	} else {
		out.push('>');
	}
}

/// Write `</tag>` unless `tag` is void.
pub fn write_close_tag(out: &mut String, tag: &str) {
	if !is_void_element(tag) {
		let _ = write!(out, "</{tag}>");
	}
}

/// Write `<!--data-->`.
pub fn write_comment(out: &mut String, data: &str) {
	let _ = write!(out, "<!--{data}-->");
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("plain", "plain")]
	#[case("a & b", "a &amp; b")]
	#[case("<b>", "&lt;b&gt;")]
	#[case("\"quoted\"", "\"quoted\"")]
	fn test_escape_text(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(escape_text(input), expected);
	}

	#[rstest]
	fn test_escape_text_borrows_when_clean() {
		assert!(matches!(escape_text("clean"), Cow::Borrowed(_)));
	}

	#[rstest]
	fn test_escape_attr_quotes() {
		assert_eq!(escape_attr("\"a\" 'b'"), "&quot;a&quot; &#x27;b&#x27;");
	}

	#[rstest]
	fn test_open_tag_with_attributes() {
		let mut attributes = IndexMap::new();
		attributes.insert("class".to_string(), "a\"b".to_string());
		attributes.insert("disabled".to_string(), String::new());
		let mut out = String::new();
		write_open_tag(&mut out, "button", &attributes);
		assert_eq!(out, r#"<button class="a&quot;b" disabled>"#);
	}

	#[rstest]
	fn test_void_elements_self_close() {
		let mut out = String::new();
		write_open_tag(&mut out, "input", &IndexMap::new());
		write_close_tag(&mut out, "input");
		assert_eq!(out, "<input />");
	}

	#[rstest]
	#[case("true", true)]
	#[case("disabled", true)]
	#[case("", false)]
	#[case("false", false)]
	#[case("0", false)]
	fn test_is_boolean_attr_truthy(#[case] value: &str, #[case] expected: bool) {
		assert_eq!(is_boolean_attr_truthy(value), expected);
	}
}
