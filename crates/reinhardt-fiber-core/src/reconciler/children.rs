//! Child list reconciliation, element dispatch and unmounting.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::context::Context;
use crate::descriptor::{Descriptor, ElementType, Node};
use crate::error::ReconcileError;
use crate::host::{HostAdapter, NodeHandle};
use crate::hydration::HydrationCursor;
use crate::instance::{InstanceId, InstanceKind, Shape, Slot};
use crate::refs::should_update_refs;

use super::transaction::{Effect, Teardown, Transaction};
use super::{Interrupt, Position, Reconciler};

impl<H: HostAdapter> Reconciler<H> {
	/// Match `nodes` against the existing children `old` of `parent`.
	///
	/// Children are matched by slot: key when present, otherwise index.
	/// Matched children with a compatible descriptor are updated, everything
	/// else is replaced. Old children that are not matched are unmounted.
	/// On error every child, old or new, has been unmounted.
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn reconcile_children(
		&mut self,
		parent: InstanceId,
		container: NodeHandle,
		old: Vec<InstanceId>,
		nodes: &[Node],
		context: &Context,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<Vec<InstanceId>, Interrupt> {
		let mut existing: IndexMap<Slot, InstanceId> = IndexMap::with_capacity(old.len());
		for id in old {
			let Some(slot) = self.tree.get(id).map(|instance| instance.slot.clone()) else {
				continue;
			};
			if let Some(displaced) = existing.insert(slot, id) {
				self.unmount_instance(displaced, true, tx);
			}
		}

		let mut next = Vec::with_capacity(nodes.len());
		let mut seen_keys = HashSet::new();
		for (index, node) in nodes.iter().enumerate() {
			if matches!(node, Node::Empty) {
				continue;
			}
			let mut slot = Slot::for_node(node, index);
			if let Slot::Keyed(key) = &slot {
				if !seen_keys.insert(key.clone()) {
					warn!(%key, "duplicate key among siblings; matching by position instead");
					slot = Slot::Index(index);
				}
			}

			let outcome = match existing.shift_remove(&slot) {
				Some(id) if self.accepts(id, node) => match self.receive_node(id, node, context, tx) {
					Ok(()) => Ok(Some(id)),
					Err(interrupt) => {
						self.unmount_instance(id, true, tx);
						Err(interrupt)
					}
				},
				stale => {
					if let Some(id) = stale {
						self.unmount_instance(id, true, tx);
					}
					let position = Position {
						parent: Some(parent),
						container,
						slot,
					};
					self.mount_node(node, position, context, tx, cursor)
				}
			};

			match outcome {
				Ok(Some(id)) => next.push(id),
				Ok(None) => {}
				Err(interrupt) => {
					for id in next.into_iter().chain(existing.into_values()) {
						self.unmount_instance(id, true, tx);
					}
					return Err(interrupt);
				}
			}
		}

		for id in existing.into_values() {
			self.unmount_instance(id, true, tx);
		}
		tx.mark_dirty(container);
		Ok(next)
	}

	/// Whether instance `id` can be updated in place with `node`.
	fn accepts(&self, id: InstanceId, node: &Node) -> bool {
		let Some(instance) = self.tree.get(id) else {
			return false;
		};
		match (&instance.kind, node) {
			(InstanceKind::Text { .. }, Node::Text(_)) => true,
			(InstanceKind::Fragment { .. }, Node::Fragment(_)) => instance.descriptor.is_none(),
			(_, Node::Element(next)) => instance
				.descriptor
				.as_ref()
				.is_some_and(|prev| prev.is_compatible(next)),
			_ => false,
		}
	}

	/// Create the instance for `node`. `Empty` creates nothing.
	pub(crate) fn mount_node(
		&mut self,
		node: &Node,
		position: Position,
		context: &Context,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<Option<InstanceId>, Interrupt> {
		match node {
			Node::Empty => Ok(None),
			Node::Text(text) => self.mount_text(text, position, context, tx, cursor).map(Some),
			Node::Fragment(children) => {
				let id = InstanceId::next();
				let container = position.container;
				self.tree.insert(
					id,
					position.instance(
						None,
						context,
						InstanceKind::Fragment {
							children: Vec::new(),
						},
					),
				);
				match self.reconcile_children(id, container, Vec::new(), children, context, tx, cursor) {
					Ok(children) => {
						self.tree.set_children(id, children);
						tx.push(Effect::Mounted(id));
						Ok(Some(id))
					}
					Err(interrupt) => {
						self.tree.remove(id);
						Err(interrupt)
					}
				}
			}
			Node::Element(descriptor) => self
				.mount_element(descriptor, position, context, tx, cursor)
				.map(Some),
		}
	}

	fn mount_element(
		&mut self,
		descriptor: &Descriptor,
		position: Position,
		context: &Context,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<InstanceId, Interrupt> {
		let id = InstanceId::next();
		match self.resolve_type(descriptor.element_type())? {
			ElementType::Host(tag) => self.mount_host(id, &tag, descriptor, position, context, tx, cursor),
			ElementType::Function(component) => {
				self.mount_function(id, &component, descriptor, position, context, tx, cursor)
			}
			ElementType::Class(class) => self.mount_class(id, &class, descriptor, position, context, tx, cursor),
			ElementType::ForwardRef(component) => {
				self.mount_forward_ref(id, &component, descriptor, position, context, tx, cursor)
			}
			ElementType::Suspense => self.mount_boundary(id, descriptor, position, context, tx, cursor),
			ElementType::Lazy(tag) => Err(ReconcileError::UnknownLazyComponent(tag).into()),
		}?;
		if descriptor.node_ref().is_some() {
			tx.push(Effect::AttachRef(id));
		}
		Ok(id)
	}

	/// Follow lazy registrations to a concrete element type.
	pub(crate) fn resolve_type(&self, element_type: &ElementType) -> Result<ElementType, Interrupt> {
		self.lazy
			.resolve_type(element_type)
			.map_err(|tag| ReconcileError::UnknownLazyComponent(tag).into())
	}

	/// Update instance `id` with `node`, which it [`accepts`](Self::accepts).
	fn receive_node(
		&mut self,
		id: InstanceId,
		node: &Node,
		context: &Context,
		tx: &mut Transaction,
	) -> Result<(), Interrupt> {
		match node {
			Node::Text(text) => {
				self.update_text(id, text, tx);
				Ok(())
			}
			Node::Fragment(children) => {
				let Some(instance) = self.tree.get_mut(id) else {
					return Err(ReconcileError::NotMounted(id).into());
				};
				instance.context = context.clone();
				let container = instance.container;
				let old = self.tree.take_children(id);
				let children = self.reconcile_children(id, container, old, children, context, tx, &mut None)?;
				self.tree.set_children(id, children);
				Ok(())
			}
			Node::Element(descriptor) => self.receive_element(id, descriptor, context, tx),
			Node::Empty => Ok(()),
		}
	}

	/// Update an element instance with a compatible descriptor.
	pub(crate) fn receive_element(
		&mut self,
		id: InstanceId,
		next: &Descriptor,
		context: &Context,
		tx: &mut Transaction,
	) -> Result<(), Interrupt> {
		let Some(instance) = self.tree.get(id) else {
			return Err(ReconcileError::NotMounted(id).into());
		};
		let Some(prev) = instance.descriptor.clone() else {
			return Err(ReconcileError::IncompatibleDescriptor {
				id,
				found: next.element_type().display_name(),
			}
			.into());
		};
		if Descriptor::ptr_eq(&prev, next) && Context::ptr_eq(&instance.context, context) {
			trace!(instance = %id, "descriptor and context unchanged");
			return Ok(());
		}
		let prev_context = instance.context.clone();
		let shape = instance.kind.shape();

		let refs_changed = should_update_refs(&prev, next);
		if refs_changed {
			self.detach_refs(id, tx);
		}
		match shape {
			Shape::Host => self.update_host(id, &prev, next, context, tx),
			Shape::Function => self.update_function(id, next, context, tx),
			Shape::Class => self.update_class(id, &prev, next, context, tx),
			Shape::ForwardRef => self.update_forward_ref(id, next, context, tx),
			Shape::Suspense => self.update_boundary(id, &prev, &prev_context, next, context, tx),
			Shape::Text | Shape::Fragment => Ok(()),
		}?;
		if refs_changed && next.node_ref().is_some() && self.tree.contains(id) {
			tx.push(Effect::AttachRef(id));
		}
		Ok(())
	}

	/// Remove `id` and its whole subtree from the tree.
	///
	/// What follows for the outside world is recorded as teardown in `tx`:
	/// refs are detached and `will_unmount` runs for committed instances,
	/// parents before children. Host nodes are detached only at the topmost
	/// host node of the subtree; descendants go away with it.
	pub(crate) fn unmount_instance(&mut self, id: InstanceId, detach_host: bool, tx: &mut Transaction) {
		let Some(mut instance) = self.tree.remove(id) else {
			trace!(instance = %id, "already unmounted");
			return;
		};
		let committed = instance.committed;
		if let Some(target) = instance.attached_ref.take() {
			tx.tear_down(Teardown::DetachRef(target));
		}

		match instance.kind {
			InstanceKind::Host { node, children } => {
				self.tree.clear_owner(node);
				for child in children {
					self.unmount_instance(child, false, tx);
				}
				if committed && detach_host {
					tx.tear_down(Teardown::Remove {
						parent: instance.container,
						node,
					});
				}
			}
			InstanceKind::Text { node, .. } => {
				if committed && detach_host {
					tx.tear_down(Teardown::Remove {
						parent: instance.container,
						node,
					});
				}
			}
			InstanceKind::Class { handle, children, .. } => {
				if committed {
					tx.tear_down(Teardown::WillUnmount(handle));
				}
				tx.tear_down(Teardown::Unregister(id));
				for child in children {
					self.unmount_instance(child, detach_host, tx);
				}
			}
			InstanceKind::Fragment { children }
			| InstanceKind::Function { children, .. }
			| InstanceKind::ForwardRef { children } => {
				for child in children {
					self.unmount_instance(child, detach_host, tx);
				}
			}
			InstanceKind::Suspense(boundary) => self.unmount_boundary(*boundary, committed, detach_host, tx),
		}
	}
}
