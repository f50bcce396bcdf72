//! Deferred work of one reconciliation pass.

use indexmap::IndexSet;

use crate::component::{ComponentRef, State, StateCallback};
use crate::descriptor::Props;
use crate::host::NodeHandle;
use crate::instance::InstanceId;
use crate::refs::RefTarget;

/// Host mutations of instances that stay mounted, and of adopted markup.
/// They are held back so that an attempt that ends up suspended or
/// mismatched leaves the host untouched.
pub(crate) enum HostPatch {
	SetProps { node: NodeHandle, props: Props },
	SetText { node: NodeHandle, text: String },
	Remove { parent: NodeHandle, node: NodeHandle },
}

/// Work that follows from instances leaving the tree or giving up a ref.
///
/// Rolling back to a checkpoint keeps it: the instances it belongs to are
/// gone from the tree either way. Only undoing the whole pass drops it.
pub(crate) enum Teardown {
	DetachRef(RefTarget),
	WillUnmount(ComponentRef),
	/// Stop accepting state updates for the instance.
	Unregister(InstanceId),
	Remove { parent: NodeHandle, node: NodeHandle },
}

pub(crate) enum Effect {
	/// Mark committed and run `did_mount` for class components.
	Mounted(InstanceId),
	AttachRef(InstanceId),
	DidUpdate {
		id: InstanceId,
		prev_props: Props,
		prev_state: State,
	},
	Callback(StateCallback),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
	effects: usize,
	patches: usize,
}

#[derive(Default)]
pub(crate) struct Transaction {
	pub(crate) teardown: Vec<Teardown>,
	pub(crate) effects: Vec<Effect>,
	pub(crate) patches: Vec<HostPatch>,
	/// Containers whose child order must be re-synced at commit.
	pub(crate) dirty: IndexSet<NodeHandle>,
}

impl Transaction {
	pub(crate) fn push(&mut self, effect: Effect) {
		self.effects.push(effect);
	}

	pub(crate) fn tear_down(&mut self, teardown: Teardown) {
		self.teardown.push(teardown);
	}

	pub(crate) fn patch(&mut self, patch: HostPatch) {
		self.patches.push(patch);
	}

	pub(crate) fn mark_dirty(&mut self, container: NodeHandle) {
		self.dirty.insert(container);
	}

	pub(crate) fn checkpoint(&self) -> Checkpoint {
		Checkpoint {
			effects: self.effects.len(),
			patches: self.patches.len(),
		}
	}

	/// Drop effects and patches recorded after `checkpoint`.
	pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
		self.effects.truncate(checkpoint.effects);
		self.patches.truncate(checkpoint.patches);
	}
}
