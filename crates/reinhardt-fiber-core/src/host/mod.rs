//! The host adapter boundary.
//!
//! The reconciler never knows what a [`NodeHandle`] is; it only asks a
//! [`HostAdapter`] to create, update, move and remove nodes, and (for
//! hydration and placement) to walk existing ones.

pub mod html;
mod memory;

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use crate::descriptor::Props;

pub use memory::{MemoryHost, Mutation};

/// Opaque handle to a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u64);

impl NodeHandle {
	/// Wrap a host-specific id.
	pub fn from_raw(raw: u64) -> Self {
		Self(raw)
	}

	/// The host-specific id.
	pub fn raw(&self) -> u64 {
		self.0
	}
}

impl fmt::Display for NodeHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "node#{}", self.0)
	}
}

/// Read-only view of an existing host node.
#[derive(Debug, Clone, PartialEq)]
pub enum HostNodeInfo {
	/// An element with its attributes.
	Element {
		/// Tag name.
		tag: String,
		/// Attributes in document order.
		attributes: IndexMap<String, String>,
	},
	/// A text node.
	Text(String),
	/// A comment node; boundary markers are comments.
	Comment(String),
}

impl HostNodeInfo {
	/// Short description for logs and mismatch errors.
	pub fn summary(&self) -> String {
		match self {
			HostNodeInfo::Element { tag, .. } => format!("<{tag}>"),
			HostNodeInfo::Text(text) => format!("text {text:?}"),
			HostNodeInfo::Comment(data) => format!("comment {data:?}"),
		}
	}
}

/// Node operations the reconciler consumes.
pub trait HostAdapter {
	/// Create a detached element with attributes derived from `props`.
	fn create_node(&mut self, tag: &str, props: &Props) -> NodeHandle;

	/// Replace an element's attributes with those derived from `props`.
	fn set_props(&mut self, node: NodeHandle, props: &Props);

	/// Create a detached text node.
	fn create_text_node(&mut self, text: &str) -> NodeHandle;

	/// Replace a text node's content.
	fn set_text(&mut self, node: NodeHandle, text: &str);

	/// Move `child` to the end of `parent`'s children.
	fn append_child(&mut self, parent: NodeHandle, child: NodeHandle);

	/// Move `child` into `parent` right before `before`, or to the end.
	fn insert_before(&mut self, parent: NodeHandle, child: NodeHandle, before: Option<NodeHandle>);

	/// Detach `child` from `parent`.
	fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle);

	/// First child of `parent`.
	fn first_child(&self, parent: NodeHandle) -> Option<NodeHandle>;

	/// Next sibling of `node`.
	fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle>;

	/// Describe an existing node.
	fn describe(&self, node: NodeHandle) -> Option<HostNodeInfo>;

	/// All children of `parent` in order.
	fn children(&self, parent: NodeHandle) -> Vec<NodeHandle> {
		let mut out = Vec::new();
		let mut next = self.first_child(parent);
		while let Some(node) = next {
			out.push(node);
			next = self.next_sibling(node);
		}
		out
	}
}

/// Attributes a host element gets for `props`.
///
/// Strings are used verbatim, numbers formatted, `true` produces a present
/// attribute with an empty value, `false` and `null` drop the attribute,
/// arrays and objects are JSON encoded. Boolean attributes with falsy string
/// values are dropped as well.
pub fn host_attributes(props: &Props) -> IndexMap<String, String> {
	let mut attributes = IndexMap::new();
	for (name, value) in props.values() {
		let rendered = match value {
			Value::Null | Value::Bool(false) => None,
			Value::Bool(true) => Some(String::new()),
			Value::String(s) if html::is_boolean_attr(name) => {
				html::is_boolean_attr_truthy(s).then(String::new)
			}
			Value::String(s) => Some(s.clone()),
			Value::Number(n) => Some(n.to_string()),
			Value::Array(_) | Value::Object(_) => Some(value.to_string()),
		};
		if let Some(rendered) = rendered {
			attributes.insert(name.clone(), rendered);
		}
	}
	attributes
}
