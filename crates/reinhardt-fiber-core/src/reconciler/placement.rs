//! Keeping host child order in line with the instance tree.
//!
//! Instances never place their own nodes. At commit every container touched
//! by the pass is synced: the host nodes the tree wants in it are collected in
//! order and moved into place with as few moves as a forward walk allows.
//! Nodes the reconciler does not own, such as markup of a dehydrated
//! boundary's neighbours or anything inserted by the embedder, are left where
//! they are.

use std::collections::HashSet;

use crate::host::{HostAdapter, NodeHandle};
use crate::instance::{InstanceId, InstanceKind};

use super::Reconciler;

impl<H: HostAdapter> Reconciler<H> {
	pub(crate) fn host_nodes_of(&self, id: InstanceId) -> Vec<NodeHandle> {
		let mut out = Vec::new();
		self.collect_host_nodes(id, &mut out);
		out
	}

	/// Append the host nodes `id` contributes to its container.
	pub(crate) fn collect_host_nodes(&self, id: InstanceId, out: &mut Vec<NodeHandle>) {
		let Some(instance) = self.tree.get(id) else {
			return;
		};
		match &instance.kind {
			InstanceKind::Host { node, .. } | InstanceKind::Text { node, .. } => out.push(*node),
			InstanceKind::Suspense(boundary) => self.collect_boundary_nodes(boundary, out),
			_ => {
				for child in instance.children().into_iter().flatten() {
					self.collect_host_nodes(*child, out);
				}
			}
		}
	}

	fn desired_children(&self, container: NodeHandle) -> Option<Vec<NodeHandle>> {
		let ids = match self.tree.owner(container) {
			Some(owner) => self.tree.get(owner)?.children()?,
			None => self.tops.get(&container)?,
		};
		let mut out = Vec::new();
		for id in ids {
			self.collect_host_nodes(*id, &mut out);
		}
		Some(out)
	}

	/// Move the owned children of `container` into tree order.
	pub(crate) fn sync_container(&mut self, container: NodeHandle) {
		let Some(desired) = self.desired_children(container) else {
			return;
		};
		let wanted: HashSet<NodeHandle> = desired.iter().copied().collect();
		let mut placed: Vec<NodeHandle> = self
			.host
			.children(container)
			.into_iter()
			.filter(|node| wanted.contains(node))
			.collect();
		if placed == desired {
			return;
		}

		for (index, node) in desired.iter().enumerate() {
			let anchor = match placed.get(index) {
				Some(current) if current == node => continue,
				Some(current) => Some(*current),
				None => placed.last().and_then(|last| self.host.next_sibling(*last)),
			};
			match anchor {
				Some(anchor) => self.host.insert_before(container, *node, Some(anchor)),
				None => self.host.append_child(container, *node),
			}
			placed.retain(|existing| existing != node);
			placed.insert(index, *node);
		}
	}
}
