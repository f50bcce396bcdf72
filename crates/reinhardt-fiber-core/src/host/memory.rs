//! In-memory host used by tests, server-side tooling and examples.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::{HostAdapter, HostNodeInfo, NodeHandle, host_attributes, html};
use crate::descriptor::Props;

#[derive(Debug, Clone)]
enum NodeData {
	Element {
		tag: String,
		attributes: IndexMap<String, String>,
	},
	Text(String),
	Comment(String),
}

#[derive(Debug, Clone)]
struct MemoryNode {
	data: NodeData,
	parent: Option<NodeHandle>,
	children: Vec<NodeHandle>,
}

/// A host mutation recorded by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
	/// An element was created.
	CreateElement {
		/// New node.
		node: NodeHandle,
		/// Its tag.
		tag: String,
	},
	/// A text node was created.
	CreateText {
		/// New node.
		node: NodeHandle,
	},
	/// Attributes were replaced.
	SetProps {
		/// Updated node.
		node: NodeHandle,
	},
	/// Text content was replaced.
	SetText {
		/// Updated node.
		node: NodeHandle,
	},
	/// A node was inserted or moved.
	Insert {
		/// New parent.
		parent: NodeHandle,
		/// Moved node.
		node: NodeHandle,
	},
	/// A node was detached.
	Remove {
		/// Former parent.
		parent: NodeHandle,
		/// Detached node.
		node: NodeHandle,
	},
}

/// A complete [`HostAdapter`] that keeps nodes in a map and logs every
/// mutation.
#[derive(Debug, Default)]
pub struct MemoryHost {
	nodes: HashMap<NodeHandle, MemoryNode>,
	next_id: u64,
	mutations: Vec<Mutation>,
}

impl MemoryHost {
	/// An empty host.
	pub fn new() -> Self {
		Self::default()
	}

	fn allocate(&mut self, data: NodeData) -> NodeHandle {
		self.next_id += 1;
		let handle = NodeHandle::from_raw(self.next_id);
		self.nodes.insert(
			handle,
			MemoryNode {
				data,
				parent: None,
				children: Vec::new(),
			},
		);
		handle
	}

	/// Create a detached `div` to render into. Not recorded as a mutation.
	pub fn create_container(&mut self) -> NodeHandle {
		self.allocate(NodeData::Element {
			tag: "div".to_string(),
			attributes: IndexMap::new(),
		})
	}

	/// Create an element from raw attributes (used when loading markup).
	pub fn create_element(&mut self, tag: &str, attributes: IndexMap<String, String>) -> NodeHandle {
		let node = self.allocate(NodeData::Element {
			tag: tag.to_ascii_lowercase(),
			attributes,
		});
		self.mutations.push(Mutation::CreateElement {
			node,
			tag: tag.to_ascii_lowercase(),
		});
		node
	}

	/// Create a comment node.
	pub fn create_comment(&mut self, data: &str) -> NodeHandle {
		self.allocate(NodeData::Comment(data.to_string()))
	}

	/// Every mutation since creation or the last [`MemoryHost::clear_mutations`].
	pub fn mutations(&self) -> &[Mutation] {
		&self.mutations
	}

	/// Forget recorded mutations.
	pub fn clear_mutations(&mut self) {
		self.mutations.clear();
	}

	/// Whether `node` exists.
	pub fn contains(&self, node: NodeHandle) -> bool {
		self.nodes.contains_key(&node)
	}

	/// Number of nodes ever created and not garbage collected.
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Parent of `node`.
	pub fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
		self.nodes.get(&node).and_then(|n| n.parent)
	}

	/// Whether `node` is `ancestor` or one of its descendants.
	pub fn is_inside(&self, node: NodeHandle, ancestor: NodeHandle) -> bool {
		let mut current = Some(node);
		while let Some(candidate) = current {
			if candidate == ancestor {
				return true;
			}
			current = self.parent(candidate);
		}
		false
	}

	/// Tag of an element.
	pub fn tag(&self, node: NodeHandle) -> Option<&str> {
		match &self.nodes.get(&node)?.data {
			NodeData::Element { tag, .. } => Some(tag),
			_ => None,
		}
	}

	/// Attribute of an element.
	pub fn attribute(&self, node: NodeHandle, name: &str) -> Option<&str> {
		match &self.nodes.get(&node)?.data {
			NodeData::Element { attributes, .. } => attributes.get(name).map(String::as_str),
			_ => None,
		}
	}

	/// Content of a text node.
	pub fn text(&self, node: NodeHandle) -> Option<&str> {
		match &self.nodes.get(&node)?.data {
			NodeData::Text(text) => Some(text),
			_ => None,
		}
	}

	/// Descendant elements with the given tag, in document order.
	pub fn find_by_tag(&self, root: NodeHandle, tag: &str) -> Vec<NodeHandle> {
		let mut found = Vec::new();
		self.collect_by_tag(root, tag, &mut found);
		found
	}

	fn collect_by_tag(&self, node: NodeHandle, tag: &str, found: &mut Vec<NodeHandle>) {
		let Some(entry) = self.nodes.get(&node) else {
			return;
		};
		for child in &entry.children {
			if self.tag(*child).is_some_and(|t| t.eq_ignore_ascii_case(tag)) {
				found.push(*child);
			}
			self.collect_by_tag(*child, tag, found);
		}
	}

	/// Concatenated text of all descendant text nodes.
	pub fn text_content(&self, node: NodeHandle) -> String {
		let mut out = String::new();
		self.collect_text(node, &mut out);
		out
	}

	fn collect_text(&self, node: NodeHandle, out: &mut String) {
		let Some(entry) = self.nodes.get(&node) else {
			return;
		};
		match &entry.data {
			NodeData::Text(text) => out.push_str(text),
			NodeData::Element { .. } => {
				for child in &entry.children {
					self.collect_text(*child, out);
				}
			}
			NodeData::Comment(_) => {}
		}
	}

	/// Serialized children of `node`.
	pub fn inner_html(&self, node: NodeHandle) -> String {
		let mut out = String::new();
		if let Some(entry) = self.nodes.get(&node) {
			for child in &entry.children {
				self.write_html(*child, &mut out);
			}
		}
		out
	}

	/// Serialized `node` including itself.
	pub fn outer_html(&self, node: NodeHandle) -> String {
		let mut out = String::new();
		self.write_html(node, &mut out);
		out
	}

	fn write_html(&self, node: NodeHandle, out: &mut String) {
		let Some(entry) = self.nodes.get(&node) else {
			return;
		};
		match &entry.data {
			NodeData::Element { tag, attributes } => {
				html::write_open_tag(out, tag, attributes);
				for child in &entry.children {
					self.write_html(*child, out);
				}
				html::write_close_tag(out, tag);
			}
			NodeData::Text(text) => out.push_str(&html::escape_text(text)),
			NodeData::Comment(data) => html::write_comment(out, data),
		}
	}

	fn detach(&mut self, child: NodeHandle) {
		let Some(parent) = self.parent(child) else {
			return;
		};
		if let Some(entry) = self.nodes.get_mut(&parent) {
			entry.children.retain(|c| *c != child);
		}
		if let Some(entry) = self.nodes.get_mut(&child) {
			entry.parent = None;
		}
	}
}

impl HostAdapter for MemoryHost {
	fn create_node(&mut self, tag: &str, props: &Props) -> NodeHandle {
		self.create_element(tag, host_attributes(props))
	}

	fn set_props(&mut self, node: NodeHandle, props: &Props) {
		if let Some(MemoryNode {
			data: NodeData::Element { attributes, .. },
			..
		}) = self.nodes.get_mut(&node)
		{
			*attributes = host_attributes(props);
			self.mutations.push(Mutation::SetProps { node });
		} else {
			tracing::warn!(%node, "set_props on a node that is not an element");
		}
	}

	fn create_text_node(&mut self, text: &str) -> NodeHandle {
		let node = self.allocate(NodeData::Text(text.to_string()));
		self.mutations.push(Mutation::CreateText { node });
		node
	}

	fn set_text(&mut self, node: NodeHandle, text: &str) {
		if let Some(MemoryNode {
			data: NodeData::Text(content),
			..
		}) = self.nodes.get_mut(&node)
		{
			*content = text.to_string();
			self.mutations.push(Mutation::SetText { node });
		} else {
			tracing::warn!(%node, "set_text on a node that is not a text node");
		}
	}

	fn append_child(&mut self, parent: NodeHandle, child: NodeHandle) {
		self.insert_before(parent, child, None);
	}

	fn insert_before(&mut self, parent: NodeHandle, child: NodeHandle, before: Option<NodeHandle>) {
		if !self.contains(parent) || !self.contains(child) || self.is_inside(parent, child) {
			tracing::warn!(%parent, %child, "invalid insertion ignored");
			return;
		}
		self.detach(child);
		let Some(entry) = self.nodes.get_mut(&parent) else {
			return;
		};
		let index = before
			.and_then(|anchor| entry.children.iter().position(|c| *c == anchor))
			.unwrap_or(entry.children.len());
		entry.children.insert(index, child);
		if let Some(node) = self.nodes.get_mut(&child) {
			node.parent = Some(parent);
		}
		self.mutations.push(Mutation::Insert {
			parent,
			node: child,
		});
	}

	fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) {
		if self.parent(child) != Some(parent) {
			tracing::warn!(%parent, %child, "remove_child on a node that is not a child");
			return;
		}
		self.detach(child);
		self.mutations.push(Mutation::Remove {
			parent,
			node: child,
		});
	}

	fn first_child(&self, parent: NodeHandle) -> Option<NodeHandle> {
		self.nodes.get(&parent)?.children.first().copied()
	}

	fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
		let parent = self.nodes.get(&self.parent(node)?)?;
		let index = parent.children.iter().position(|c| *c == node)?;
		parent.children.get(index + 1).copied()
	}

	fn describe(&self, node: NodeHandle) -> Option<HostNodeInfo> {
		Some(match &self.nodes.get(&node)?.data {
			NodeData::Element { tag, attributes } => HostNodeInfo::Element {
				tag: tag.clone(),
				attributes: attributes.clone(),
			},
			NodeData::Text(text) => HostNodeInfo::Text(text.clone()),
			NodeData::Comment(data) => HostNodeInfo::Comment(data.clone()),
		})
	}

	fn children(&self, parent: NodeHandle) -> Vec<NodeHandle> {
		self.nodes
			.get(&parent)
			.map(|entry| entry.children.clone())
			.unwrap_or_default()
	}
}
