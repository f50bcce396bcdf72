//! Ambient context threaded down the instance tree.
//!
//! A [`Context`] is an immutable, shared map. Composites that declare child
//! context produce a *new* merged value for their subtree; nothing is ever
//! mutated in place, so an instance holding an older value keeps seeing
//! exactly what it was rendered with.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

/// Immutable view of ambient context entries.
#[derive(Clone, Default, PartialEq)]
pub struct Context(Rc<IndexMap<String, Value>>);

impl Context {
	/// An empty context.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder that returns a new context with one more entry.
	pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		let mut entries = self.entries().clone();
		entries.insert(key.into(), value.into());
		Self(Rc::new(entries))
	}

	/// Look up an entry.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	/// Look up a string entry.
	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.0.get(key).and_then(Value::as_str)
	}

	/// All entries in declaration order.
	pub fn entries(&self) -> &IndexMap<String, Value> {
		&self.0
	}

	/// Whether there are no entries.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Whether both values are the same allocation.
	pub fn ptr_eq(a: &Context, b: &Context) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}

	/// Shallow merge where `child` entries override ancestor entries.
	///
	/// Returns `self` unchanged (same allocation) when `child` adds nothing,
	/// so subtrees below a composite without child context keep bailing out.
	pub fn merged(&self, child: Option<IndexMap<String, Value>>) -> Context {
		match child {
			Some(entries) if !entries.is_empty() => {
				let mut merged = self.entries().clone();
				merged.extend(entries);
				Context(Rc::new(merged))
			}
			_ => self.clone(),
		}
	}
}

impl fmt::Debug for Context {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.0.iter()).finish()
	}
}

impl FromIterator<(String, Value)> for Context {
	fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
		Self(Rc::new(iter.into_iter().collect()))
	}
}

/// The subset of `ambient` a consumer declared interest in.
///
/// Undeclared keys are invisible, declared keys missing from the ambient
/// context are simply absent.
pub fn get_masked_context(declared: &[&str], ambient: &Context) -> Context {
	if declared.is_empty() {
		return Context::default();
	}
	declared
		.iter()
		.filter_map(|key| {
			ambient
				.get(key)
				.map(|value| ((*key).to_string(), value.clone()))
		})
		.collect()
}
