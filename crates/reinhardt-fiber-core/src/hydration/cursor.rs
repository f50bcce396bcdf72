//! Document-order walk over existing markup.

use crate::host::{HostAdapter, HostNodeInfo, NodeHandle};

use super::markers::{Marker, parse_marker};

/// A span of sibling nodes delimited by boundary markers, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MarkupRegion {
	pub(crate) container: NodeHandle,
	pub(crate) start: NodeHandle,
	pub(crate) end: NodeHandle,
}

impl MarkupRegion {
	/// Locate the region opened by `start` by counting nested markers.
	pub(crate) fn find<H: HostAdapter>(host: &H, container: NodeHandle, start: NodeHandle) -> Option<Self> {
		let mut depth = 0usize;
		let mut next = host.next_sibling(start);
		while let Some(node) = next {
			if let Some(HostNodeInfo::Comment(data)) = host.describe(node) {
				match parse_marker(&data) {
					Some(Marker::End) if depth == 0 => {
						return Some(Self {
							container,
							start,
							end: node,
						});
					}
					Some(Marker::End) => depth -= 1,
					Some(_) => depth += 1,
					None => {}
				}
			}
			next = host.next_sibling(node);
		}
		None
	}

	/// All nodes from start marker to end marker.
	pub(crate) fn nodes<H: HostAdapter>(&self, host: &H) -> Vec<NodeHandle> {
		let mut out = vec![self.start];
		let mut next = host.next_sibling(self.start);
		while let Some(node) = next {
			out.push(node);
			if node == self.end {
				break;
			}
			next = host.next_sibling(node);
		}
		out
	}
}

/// Position inside a list of existing sibling nodes.
#[derive(Debug, Clone)]
pub(crate) struct HydrationCursor {
	pub(crate) parent: NodeHandle,
	next: Option<NodeHandle>,
	/// Exclusive stop node (a region's end marker).
	end: Option<NodeHandle>,
}

impl HydrationCursor {
	pub(crate) fn children_of<H: HostAdapter>(host: &H, parent: NodeHandle) -> Self {
		Self {
			parent,
			next: host.first_child(parent),
			end: None,
		}
	}

	pub(crate) fn within<H: HostAdapter>(host: &H, region: &MarkupRegion) -> Self {
		Self {
			parent: region.container,
			next: host.next_sibling(region.start),
			end: Some(region.end),
		}
	}

	/// The next node that takes part in hydration.
	///
	/// Comments other than boundary markers (text separators, stray
	/// comments) are skipped over.
	pub(crate) fn peek<H: HostAdapter>(&mut self, host: &H) -> Option<(NodeHandle, HostNodeInfo)> {
		loop {
			let node = self.next?;
			if Some(node) == self.end {
				return None;
			}
			let info = host.describe(node)?;
			if let HostNodeInfo::Comment(data) = &info {
				if parse_marker(data).is_none() {
					self.next = host.next_sibling(node);
					continue;
				}
			}
			return Some((node, info));
		}
	}

	/// Continue after `node`.
	pub(crate) fn advance_past<H: HostAdapter>(&mut self, host: &H, node: NodeHandle) {
		self.next = host.next_sibling(node);
	}

	/// Nodes between the cursor and its end that nothing claimed.
	pub(crate) fn remaining<H: HostAdapter>(&self, host: &H) -> Vec<NodeHandle> {
		let mut out = Vec::new();
		let mut next = self.next;
		while let Some(node) = next {
			if Some(node) == self.end {
				break;
			}
			out.push(node);
			next = host.next_sibling(node);
		}
		out
	}
}
