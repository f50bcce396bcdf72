//! Applying a finished transaction.

use tracing::warn;

use crate::descriptor::Descriptor;
use crate::host::HostAdapter;
use crate::instance::{InstanceId, InstanceKind};
use crate::refs::{PublicInstance, RefTarget};

use super::Reconciler;
use super::transaction::{Effect, HostPatch, Teardown, Transaction};

impl<H: HostAdapter> Reconciler<H> {
	/// Teardown first, then patches and child order, then effects in the
	/// order recorded.
	///
	/// Effects of instances unmounted later in the same pass are skipped.
	pub(crate) fn commit(&mut self, tx: Transaction) {
		let Transaction {
			teardown,
			effects,
			patches,
			dirty,
		} = tx;
		for step in teardown {
			match step {
				Teardown::DetachRef(target) => target.deliver(None),
				Teardown::WillUnmount(handle) => handle.borrow_mut().will_unmount(),
				Teardown::Unregister(id) => self.updates.unregister(id),
				Teardown::Remove { parent, node } => self.host.remove_child(parent, node),
			}
		}
		for patch in patches {
			match patch {
				HostPatch::SetProps { node, props } => self.host.set_props(node, &props),
				HostPatch::SetText { node, text } => self.host.set_text(node, &text),
				HostPatch::Remove { parent, node } => self.host.remove_child(parent, node),
			}
		}
		for container in dirty {
			self.sync_container(container);
		}
		for effect in effects {
			match effect {
				Effect::Mounted(id) => {
					let Some(instance) = self.tree.get_mut(id) else {
						continue;
					};
					instance.committed = true;
					if let InstanceKind::Class { handle, .. } = &instance.kind {
						let handle = handle.clone();
						handle.borrow_mut().did_mount();
					}
				}
				Effect::AttachRef(id) => self.attach_refs(id),
				Effect::DidUpdate {
					id,
					prev_props,
					prev_state,
				} => {
					if let Some(InstanceKind::Class { handle, .. }) = self.tree.get(id).map(|instance| &instance.kind) {
						let handle = handle.clone();
						handle.borrow_mut().did_update(&prev_props, &prev_state);
					}
				}
				Effect::Callback(callback) => callback.run(),
			}
		}
	}

	/// Hand the public instance of `id` to the ref on its descriptor.
	pub(crate) fn attach_refs(&mut self, id: InstanceId) {
		let Some(instance) = self.tree.get(id) else {
			return;
		};
		let Some(target) = instance.descriptor.as_ref().and_then(Descriptor::node_ref).cloned() else {
			return;
		};
		if instance
			.attached_ref
			.as_ref()
			.is_some_and(|current| RefTarget::ptr_eq(current, &target))
		{
			return;
		}
		let public = match &instance.kind {
			InstanceKind::Host { node, .. } => PublicInstance::Host(*node),
			InstanceKind::Class { handle, .. } => PublicInstance::Component(handle.clone()),
			// The ref was handed to the render function instead.
			InstanceKind::ForwardRef { .. } => return,
			InstanceKind::Function { component, .. } => {
				warn!(instance = %id, component = component.name(), "function components cannot hold refs");
				return;
			}
			_ => return,
		};
		if let Some(previous) = self.tree.get_mut(id).and_then(|instance| instance.attached_ref.take()) {
			previous.deliver(None);
		}
		target.deliver(Some(public));
		if let Some(instance) = self.tree.get_mut(id) {
			instance.attached_ref = Some(target);
		}
	}

	/// Release the ref currently holding `id`, if any, once `tx` commits.
	pub(crate) fn detach_refs(&mut self, id: InstanceId, tx: &mut Transaction) {
		if let Some(target) = self.tree.get_mut(id).and_then(|instance| instance.attached_ref.take()) {
			tx.tear_down(Teardown::DetachRef(target));
		}
	}
}
