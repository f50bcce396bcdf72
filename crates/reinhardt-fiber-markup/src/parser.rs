//! HTML fragment parsing into a [`MemoryHost`].

use indexmap::IndexMap;
use reinhardt_fiber_core::{HostAdapter, MemoryHost, NodeHandle};
use scraper::{ElementRef, Html, Node};
use tracing::{debug, trace};

use crate::error::MarkupError;

/// Parse `html` as a fragment and append its nodes to `container`.
///
/// Returns the top-level nodes that were appended. Parser errors are
/// recovered the way browsers recover them and only logged.
pub fn parse_into(host: &mut MemoryHost, container: NodeHandle, html: &str) -> Result<Vec<NodeHandle>, MarkupError> {
	let fragment = parse(host, container, html)?;
	if !fragment.errors.is_empty() {
		debug!(errors = ?fragment.errors, "recovered from malformed markup");
	}
	Ok(append_fragment(host, container, &fragment))
}

/// Like [`parse_into`], but reject markup the parser had to repair.
///
/// Nothing is appended when the markup is rejected.
pub fn parse_into_strict(
	host: &mut MemoryHost,
	container: NodeHandle,
	html: &str,
) -> Result<Vec<NodeHandle>, MarkupError> {
	let fragment = parse(host, container, html)?;
	if !fragment.errors.is_empty() {
		return Err(MarkupError::Malformed(
			fragment.errors.iter().map(ToString::to_string).collect(),
		));
	}
	Ok(append_fragment(host, container, &fragment))
}

fn parse(host: &MemoryHost, container: NodeHandle, html: &str) -> Result<Html, MarkupError> {
	if !host.contains(container) {
		return Err(MarkupError::MissingContainer(container));
	}
	trace!(bytes = html.len(), "parsing markup fragment");
	Ok(Html::parse_fragment(html))
}

fn append_fragment(host: &mut MemoryHost, container: NodeHandle, fragment: &Html) -> Vec<NodeHandle> {
	// The fragment's children hang off a synthetic root element.
	let root = fragment.root_element();
	let mut top = Vec::new();
	for child in root.children() {
		if let Some(node) = build(host, child.value(), ElementRef::wrap(child)) {
			host.append_child(container, node);
			top.push(node);
		}
	}
	top
}

fn build(host: &mut MemoryHost, value: &Node, element: Option<ElementRef<'_>>) -> Option<NodeHandle> {
	match value {
		Node::Text(text) => Some(host.create_text_node(&text.text)),
		Node::Comment(comment) => Some(host.create_comment(&comment.comment)),
		Node::Element(data) => {
			let attributes: IndexMap<String, String> = data
				.attrs()
				.map(|(name, value)| (name.to_string(), value.to_string()))
				.collect();
			let node = host.create_element(data.name(), attributes);
			if let Some(element) = element {
				for child in element.children() {
					if let Some(built) = build(host, child.value(), ElementRef::wrap(child)) {
						host.append_child(node, built);
					}
				}
			}
			Some(node)
		}
		_ => None,
	}
}
