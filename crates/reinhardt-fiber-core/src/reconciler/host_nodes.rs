//! Host element and text instances, including adoption of existing markup.

use tracing::warn;

use crate::context::Context;
use crate::descriptor::{Descriptor, Props};
use crate::error::{HydrationError, ReconcileError};
use crate::host::{HostAdapter, HostNodeInfo, NodeHandle, host_attributes};
use crate::hydration::HydrationCursor;
use crate::instance::{InstanceId, InstanceKind};

use super::transaction::{Effect, HostPatch, Transaction};
use super::{Interrupt, Position, Reconciler};

impl<H: HostAdapter> Reconciler<H> {
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn mount_host(
		&mut self,
		id: InstanceId,
		tag: &str,
		descriptor: &Descriptor,
		position: Position,
		context: &Context,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<(), Interrupt> {
		let (node, mut children_cursor) = match cursor.as_mut() {
			Some(cursor) => {
				let node = self.adopt_element(cursor, tag, descriptor.props(), tx)?;
				(node, Some(HydrationCursor::children_of(&self.host, node)))
			}
			None => (self.host.create_node(tag, descriptor.props()), None),
		};
		let container = position.container;
		self.tree.insert(
			id,
			position.instance(
				Some(descriptor.clone()),
				context,
				InstanceKind::Host {
					node,
					children: Vec::new(),
				},
			),
		);
		self.tree.set_owner(node, id);

		let children = self.reconcile_children(
			id,
			node,
			Vec::new(),
			descriptor.props().children(),
			context,
			tx,
			&mut children_cursor,
		);
		match children {
			Ok(children) => self.tree.set_children(id, children),
			Err(interrupt) => {
				self.tree.clear_owner(node);
				self.tree.remove(id);
				return Err(interrupt);
			}
		}
		if let Some(children_cursor) = &children_cursor {
			self.discard_unclaimed(children_cursor, tx);
		}
		tx.mark_dirty(container);
		tx.push(Effect::Mounted(id));
		Ok(())
	}

	/// Claim the next existing node as a `tag` element.
	fn adopt_element(
		&mut self,
		cursor: &mut HydrationCursor,
		tag: &str,
		props: &Props,
		tx: &mut Transaction,
	) -> Result<NodeHandle, Interrupt> {
		match cursor.peek(&self.host) {
			Some((node, HostNodeInfo::Element { tag: found, attributes })) if found.eq_ignore_ascii_case(tag) => {
				cursor.advance_past(&self.host, node);
				let expected = host_attributes(props);
				if attributes != expected {
					if !self.config.patch_hydration_mismatches {
						return Err(Interrupt::Mismatch(HydrationError::StructureMismatch {
							expected: format!("<{tag}> with {expected:?}"),
							found: format!("<{found}> with {attributes:?}"),
						}));
					}
					warn!(%node, tag, "attributes differ from server markup; patching");
					tx.patch(HostPatch::SetProps {
						node,
						props: props.clone(),
					});
				}
				Ok(node)
			}
			Some((_, info)) => Err(Interrupt::Mismatch(HydrationError::StructureMismatch {
				expected: format!("<{tag}>"),
				found: info.summary(),
			})),
			None => Err(Interrupt::Mismatch(HydrationError::MissingNode {
				expected: format!("<{tag}>"),
			})),
		}
	}

	pub(crate) fn update_host(
		&mut self,
		id: InstanceId,
		prev: &Descriptor,
		next: &Descriptor,
		context: &Context,
		tx: &mut Transaction,
	) -> Result<(), Interrupt> {
		let Some(instance) = self.tree.get_mut(id) else {
			return Err(ReconcileError::NotMounted(id).into());
		};
		let InstanceKind::Host { node, .. } = instance.kind else {
			return Err(ReconcileError::NotMounted(id).into());
		};
		instance.descriptor = Some(next.clone());
		instance.context = context.clone();

		if prev.props().values() != next.props().values() {
			tx.patch(HostPatch::SetProps {
				node,
				props: next.props().clone(),
			});
		}
		let old = self.tree.take_children(id);
		let children = self.reconcile_children(id, node, old, next.props().children(), context, tx, &mut None)?;
		self.tree.set_children(id, children);
		Ok(())
	}

	pub(crate) fn mount_text(
		&mut self,
		text: &str,
		position: Position,
		context: &Context,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<InstanceId, Interrupt> {
		let node = match cursor.as_mut() {
			// Empty text never makes it into markup.
			Some(cursor) if !text.is_empty() => self.adopt_text(cursor, text, tx)?,
			_ => self.host.create_text_node(text),
		};
		let id = InstanceId::next();
		tx.mark_dirty(position.container);
		self.tree.insert(
			id,
			position.instance(
				None,
				context,
				InstanceKind::Text {
					node,
					text: text.to_string(),
				},
			),
		);
		tx.push(Effect::Mounted(id));
		Ok(id)
	}

	fn adopt_text(
		&mut self,
		cursor: &mut HydrationCursor,
		text: &str,
		tx: &mut Transaction,
	) -> Result<NodeHandle, Interrupt> {
		match cursor.peek(&self.host) {
			Some((node, HostNodeInfo::Text(found))) => {
				cursor.advance_past(&self.host, node);
				if found != text {
					if !self.config.patch_hydration_mismatches {
						return Err(Interrupt::Mismatch(HydrationError::StructureMismatch {
							expected: format!("text {text:?}"),
							found: format!("text {found:?}"),
						}));
					}
					warn!(%node, "text differs from server markup; patching");
					tx.patch(HostPatch::SetText {
						node,
						text: text.to_string(),
					});
				}
				Ok(node)
			}
			Some((_, info)) => Err(Interrupt::Mismatch(HydrationError::StructureMismatch {
				expected: format!("text {text:?}"),
				found: info.summary(),
			})),
			None => Err(Interrupt::Mismatch(HydrationError::MissingNode {
				expected: format!("text {text:?}"),
			})),
		}
	}

	pub(crate) fn update_text(&mut self, id: InstanceId, text: &str, tx: &mut Transaction) {
		let Some(InstanceKind::Text { node, text: current }) = self.tree.get_mut(id).map(|instance| &mut instance.kind)
		else {
			return;
		};
		if current.as_str() == text {
			return;
		}
		*current = text.to_string();
		tx.patch(HostPatch::SetText {
			node: *node,
			text: text.to_string(),
		});
	}
}
