//! The reconciler: mount, update and unmount of the instance tree.
//!
//! Every public operation runs one pass. A pass builds and updates instances
//! immediately and records deferred work in a transaction: ref attachment,
//! lifecycle notifications, hydration patches, and the containers whose
//! child order must be synced. The transaction commits once the pass is done,
//! so a subtree that suspends or fails can be thrown away without any of its
//! effects becoming observable.
//!
//! Updates also journal every change they make to the instance tree. When a
//! suspension escapes every boundary, the journal is undone and the
//! transaction dropped, which leaves the committed tree exactly as it was.

mod children;
mod commit;
mod composite;
mod host_nodes;
mod placement;
pub(crate) mod transaction;

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, debug_span, warn};

use crate::component::{PendingUpdate, State, UpdateQueue};
use crate::config::ReconcilerConfig;
use crate::context::Context;
use crate::descriptor::{Descriptor, LazyRegistry, Node};
use crate::error::{HydrationError, ReconcileError, RenderError};
use crate::host::{HostAdapter, NodeHandle};
use crate::hydration::{BoundaryState, HydrationCursor, PingQueue};
use crate::instance::{Instance, InstanceId, InstanceKind, InstanceTree, Slot};
use crate::refs::PublicInstance;
use crate::suspense::Suspension;

use transaction::{HostPatch, Transaction};

/// How far up a pass unwound.
pub(crate) enum Interrupt {
	/// A component suspended; the nearest boundary shows its fallback.
	Suspended(Suspension),
	/// Existing markup did not match while hydrating.
	Mismatch(HydrationError),
	Failed(ReconcileError),
}

impl Interrupt {
	pub(crate) fn render(error: RenderError, component: &str) -> Self {
		Interrupt::Failed(ReconcileError::Render(error.in_component(component)))
	}
}

impl From<ReconcileError> for Interrupt {
	fn from(error: ReconcileError) -> Self {
		Interrupt::Failed(error)
	}
}

/// Where a new instance goes.
#[derive(Debug, Clone)]
pub(crate) struct Position {
	pub(crate) parent: Option<InstanceId>,
	pub(crate) container: NodeHandle,
	pub(crate) slot: Slot,
}

impl Position {
	pub(crate) fn instance(
		&self,
		descriptor: Option<Descriptor>,
		context: &Context,
		kind: InstanceKind,
	) -> Instance {
		Instance::new(
			self.parent,
			self.container,
			self.slot.clone(),
			descriptor,
			context.clone(),
			kind,
		)
	}
}

/// Whether a mount completed.
#[derive(Debug)]
pub enum MountStatus {
	/// The tree is mounted and committed.
	Mounted,
	/// Something suspended with no boundary to catch it. Nothing was
	/// committed; mount again once the token resolves.
	Threw(Suspension),
}

/// Outcome of [`Reconciler::mount`] and [`Reconciler::hydrate`].
#[derive(Debug)]
pub struct MountResult {
	/// The top-level instance, absent when the tree rendered nothing.
	pub instance: Option<InstanceId>,
	/// Host nodes the top-level instance placed into the container.
	pub nodes: Vec<NodeHandle>,
	/// Whether the mount completed.
	pub status: MountStatus,
}

/// Outcome of [`Reconciler::receive_component`].
#[derive(Debug)]
pub enum UpdateResult {
	/// Descriptor and context were identical; nothing ran.
	Skipped,
	/// The instance was updated and the pass committed.
	Updated,
	/// Something suspended with no boundary to catch it. The update was
	/// abandoned and the committed tree left as it was.
	Threw(Suspension),
}

/// Owns the instance tree for any number of containers of one host.
pub struct Reconciler<H: HostAdapter> {
	pub(crate) host: H,
	pub(crate) tree: InstanceTree,
	pub(crate) lazy: LazyRegistry,
	pub(crate) config: ReconcilerConfig,
	pub(crate) updates: UpdateQueue,
	pub(crate) pings: PingQueue,
	/// Top-level instances of each container, in mount order.
	pub(crate) tops: HashMap<NodeHandle, Vec<InstanceId>>,
}

impl<H: HostAdapter> Reconciler<H> {
	/// Create a reconciler with the default configuration.
	pub fn new(host: H) -> Self {
		Self {
			host,
			tree: InstanceTree::default(),
			lazy: LazyRegistry::new(),
			config: ReconcilerConfig::default(),
			updates: UpdateQueue::default(),
			pings: PingQueue::default(),
			tops: HashMap::new(),
		}
	}

	/// Replace the configuration.
	pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
		self.config = config;
		self
	}

	/// Resolve lazy element types through `registry`.
	pub fn with_lazy_registry(mut self, registry: LazyRegistry) -> Self {
		self.lazy = registry;
		self
	}

	/// Limits this reconciler was built with.
	pub fn config(&self) -> &ReconcilerConfig {
		&self.config
	}

	/// The host adapter.
	pub fn host(&self) -> &H {
		&self.host
	}

	/// The host adapter, mutably.
	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	/// Give up the tree and hand back the host.
	pub fn into_host(self) -> H {
		self.host
	}

	/// Build a fresh tree for `descriptor` and place it into `container`.
	pub fn mount(
		&mut self,
		descriptor: &Descriptor,
		container: NodeHandle,
		context: &Context,
	) -> Result<MountResult, ReconcileError> {
		self.mount_root(descriptor, container, context, false)
	}

	/// Like [`mount`](Self::mount), but adopt the nodes already present in
	/// `container` instead of creating them.
	///
	/// Boundaries whose content suspends keep their server markup and
	/// hydrate when their token resolves. When the markup outside of any
	/// boundary does not match, the container is cleared and rendered from
	/// scratch.
	pub fn hydrate(
		&mut self,
		descriptor: &Descriptor,
		container: NodeHandle,
		context: &Context,
	) -> Result<MountResult, ReconcileError> {
		self.mount_root(descriptor, container, context, true)
	}

	fn mount_root(
		&mut self,
		descriptor: &Descriptor,
		container: NodeHandle,
		context: &Context,
		hydrate: bool,
	) -> Result<MountResult, ReconcileError> {
		let _span = debug_span!(
			"mount",
			%container,
			hydrate,
			root = %descriptor.element_type().display_name()
		)
		.entered();
		let node = Node::Element(descriptor.clone());
		let position = Position {
			parent: None,
			container,
			slot: Slot::Index(self.tops.get(&container).map_or(0, Vec::len)),
		};
		self.tree.open_journal();
		let mut tx = Transaction::default();
		let start = tx.checkpoint();
		let mut cursor = hydrate.then(|| HydrationCursor::children_of(&self.host, container));
		let mut result = self.mount_node(&node, position.clone(), context, &mut tx, &mut cursor);

		if let Err(Interrupt::Mismatch(error)) = &result {
			warn!(%error, "hydration failed outside of any boundary; rendering from scratch");
			tx.rollback(start);
			for existing in self.host.children(container) {
				tx.patch(HostPatch::Remove {
					parent: container,
					node: existing,
				});
			}
			cursor = None;
			result = self.mount_node(&node, position, context, &mut tx, &mut cursor);
		}

		match result {
			Ok(instance) => {
				if let Some(cursor) = &cursor {
					self.discard_unclaimed(cursor, &mut tx);
				}
				if let Some(id) = instance {
					self.tops.entry(container).or_default().push(id);
				}
				tx.mark_dirty(container);
				self.tree.close_journal();
				self.commit(tx);
				let nodes = instance.map(|id| self.host_nodes_of(id)).unwrap_or_default();
				debug!(instances = self.tree.len(), "mounted");
				Ok(MountResult {
					instance,
					nodes,
					status: MountStatus::Mounted,
				})
			}
			Err(interrupt) => {
				self.abandon_pass(tx);
				match interrupt {
					Interrupt::Suspended(suspension) => {
						debug!(token = suspension.token().id(), "root suspended outside of any boundary");
						Ok(MountResult {
							instance: None,
							nodes: Vec::new(),
							status: MountStatus::Threw(suspension),
						})
					}
					Interrupt::Mismatch(error) => Err(error.into()),
					Interrupt::Failed(error) => Err(error),
				}
			}
		}
	}

	/// Update instance `id` with a new descriptor and context.
	///
	/// When both are identical by reference to what the instance last saw,
	/// nothing runs at all.
	pub fn receive_component(
		&mut self,
		id: InstanceId,
		descriptor: &Descriptor,
		context: &Context,
	) -> Result<UpdateResult, ReconcileError> {
		let Some(instance) = self.tree.get(id) else {
			return Err(ReconcileError::NotMounted(id));
		};
		let Some(prev) = instance.descriptor.as_ref() else {
			return Err(ReconcileError::IncompatibleDescriptor {
				id,
				found: descriptor.element_type().display_name(),
			});
		};
		if !prev.is_compatible(descriptor) {
			return Err(ReconcileError::IncompatibleDescriptor {
				id,
				found: descriptor.element_type().display_name(),
			});
		}
		if Descriptor::ptr_eq(prev, descriptor) && Context::ptr_eq(&instance.context, context) {
			return Ok(UpdateResult::Skipped);
		}

		let _span = debug_span!("receive", instance = %id).entered();
		self.tree.open_journal();
		let mut tx = Transaction::default();
		let outcome = match self.receive_element(id, descriptor, context, &mut tx) {
			Ok(()) => Ok(None),
			Err(interrupt) => self.resolve_interrupt(id, interrupt, &mut tx),
		};
		match self.finish_pass(tx, outcome)? {
			Some(suspension) => Ok(UpdateResult::Threw(suspension)),
			None => Ok(UpdateResult::Updated),
		}
	}

	/// Tear down instance `id` and everything below it.
	///
	/// # Panics
	///
	/// Unmounting an instance that is not mounted is a caller bug and panics
	/// in debug builds. Release builds return [`ReconcileError::NotMounted`].
	pub fn unmount_component(&mut self, id: InstanceId) -> Result<(), ReconcileError> {
		let Some(instance) = self.tree.get(id) else {
			if cfg!(debug_assertions) {
				panic!("instance {id} is not mounted");
			}
			return Err(ReconcileError::NotMounted(id));
		};
		let _span = debug_span!("unmount", instance = %id).entered();
		match instance.parent {
			Some(parent) => self.forget_child(parent, id),
			None => self.forget_top_level(id),
		}
		let mut tx = Transaction::default();
		self.unmount_instance(id, true, &mut tx);
		self.commit(tx);
		Ok(())
	}

	/// Apply state updates queued for `id`.
	///
	/// Returns whether the instance re-rendered or skipped through its
	/// update check; `false` when nothing was pending.
	pub fn perform_update_if_necessary(&mut self, id: InstanceId) -> Result<bool, ReconcileError> {
		let Some(instance) = self.tree.get_mut(id) else {
			return Err(ReconcileError::NotMounted(id));
		};
		let has_pending = instance.pending.as_ref().is_some_and(|pending| !pending.is_empty())
			|| self.updates.has_updates_for(id);
		if !has_pending {
			return Ok(false);
		}
		if !matches!(instance.kind, InstanceKind::Class { .. }) {
			instance.pending = None;
			return Ok(false);
		}
		let Some(descriptor) = instance.descriptor.clone() else {
			return Ok(false);
		};
		let context = instance.context.clone();

		let _span = debug_span!("update", instance = %id).entered();
		self.tree.open_journal();
		let mut tx = Transaction::default();
		let outcome = match self.update_class(id, &descriptor, &descriptor, &context, &mut tx) {
			Ok(()) => Ok(None),
			Err(interrupt) => self.resolve_interrupt(id, interrupt, &mut tx),
		};
		match self.finish_pass(tx, outcome)? {
			Some(_) => Err(ReconcileError::SuspendedOutsideBoundary),
			None => Ok(true),
		}
	}

	/// Run queued state updates and boundary retries until none are left.
	///
	/// Each round applies everything queued so far, parents before children,
	/// then retries pinged boundaries. Work queued during a round runs in the
	/// next one; more than `max_update_depth` rounds is an error.
	///
	/// A failing update or retry does not stop the rest of its round. The
	/// round is finished and the first error returned; work queued meanwhile
	/// stays queued for the next flush.
	pub fn flush(&mut self) -> Result<(), ReconcileError> {
		let _span = debug_span!("flush").entered();
		for round in 0..self.config.max_update_depth {
			let queued = self.updates.drain();
			let pings = self.pings.drain();
			if queued.is_empty() && pings.is_empty() {
				return Ok(());
			}
			debug!(round, updates = queued.len(), pings = pings.len(), "flush round");

			let mut dirty: Vec<InstanceId> = Vec::new();
			for (id, update) in queued {
				match self.tree.get_mut(id) {
					Some(instance) => {
						instance
							.pending
							.get_or_insert_with(PendingUpdate::default)
							.extend([update]);
						if !dirty.contains(&id) {
							dirty.push(id);
						}
					}
					None => debug!(instance = %id, "update for an unmounted instance dropped"),
				}
			}
			dirty.sort_by_key(|id| self.tree.depth(*id));
			let mut failure = None;
			for id in dirty {
				if self.tree.contains(id) {
					if let Err(error) = self.perform_update_if_necessary(id) {
						warn!(instance = %id, %error, "state update failed");
						failure.get_or_insert(error);
					}
				}
			}
			for ping in pings {
				let boundary = ping.boundary;
				if let Err(error) = self.retry_boundary(ping) {
					warn!(%boundary, %error, "boundary retry failed");
					failure.get_or_insert(error);
				}
			}
			if let Some(error) = failure {
				return Err(error);
			}
		}
		Err(ReconcileError::UpdateDepthExceeded(self.config.max_update_depth))
	}

	/// Whether state updates or boundary retries are waiting for a flush.
	pub fn has_pending_work(&self) -> bool {
		!self.updates.is_empty() || !self.pings.is_empty()
	}

	/// Number of live instances.
	pub fn instance_count(&self) -> usize {
		self.tree.len()
	}

	/// Whether `id` names a live instance.
	pub fn is_mounted(&self, id: InstanceId) -> bool {
		self.tree.contains(id)
	}

	/// Top-level instances mounted into `container`.
	pub fn top_level(&self, container: NodeHandle) -> &[InstanceId] {
		self.tops.get(&container).map_or(&[], Vec::as_slice)
	}

	/// Child instances of `id`. For a suspense boundary these are the
	/// children currently shown.
	pub fn children(&self, id: InstanceId) -> Vec<InstanceId> {
		let Some(instance) = self.tree.get(id) else {
			return Vec::new();
		};
		match (instance.children(), instance.boundary()) {
			(Some(children), _) => children.clone(),
			(None, Some(boundary)) => boundary.shown().to_vec(),
			(None, None) => Vec::new(),
		}
	}

	/// Suspense boundaries at or below `id`, in tree order.
	pub fn boundaries(&self, id: InstanceId) -> Vec<InstanceId> {
		let mut out = Vec::new();
		let mut stack = vec![id];
		while let Some(current) = stack.pop() {
			if self.tree.get(current).and_then(Instance::boundary).is_some() {
				out.push(current);
			}
			stack.extend(self.children(current).into_iter().rev());
		}
		out
	}

	/// Host nodes `id` contributes to its container, in order.
	pub fn host_nodes(&self, id: InstanceId) -> Vec<NodeHandle> {
		self.host_nodes_of(id)
	}

	/// The handle a ref on `id` would receive.
	pub fn public_instance(&self, id: InstanceId) -> Option<PublicInstance> {
		match &self.tree.get(id)?.kind {
			InstanceKind::Host { node, .. } => Some(PublicInstance::Host(*node)),
			InstanceKind::Class { handle, .. } => Some(PublicInstance::Component(handle.clone())),
			_ => None,
		}
	}

	/// Current state of a class component instance.
	pub fn component_state(&self, id: InstanceId) -> Option<State> {
		match &self.tree.get(id)?.kind {
			InstanceKind::Class { state, .. } => Some(state.clone()),
			_ => None,
		}
	}

	/// Hydration state of a boundary, `None` for anything else and for
	/// boundaries that never had server markup.
	pub fn boundary_state(&self, id: InstanceId) -> Option<BoundaryState> {
		self.tree.get(id)?.boundary()?.state
	}

	/// Whether boundary `id` currently shows its fallback.
	pub fn is_showing_fallback(&self, id: InstanceId) -> Option<bool> {
		Some(self.tree.get(id)?.boundary()?.showing_fallback)
	}

	/// Context the children of `id` receive.
	pub fn child_context(&self, id: InstanceId) -> Option<Context> {
		let instance = self.tree.get(id)?;
		match &instance.kind {
			InstanceKind::Class {
				class, handle, state, ..
			} => {
				let descriptor = instance.descriptor.as_ref()?;
				Some(self.class_child_context(class, handle, descriptor.props(), state, &instance.context))
			}
			_ => Some(instance.context.clone()),
		}
	}

	pub(crate) fn forget_top_level(&mut self, id: InstanceId) {
		for tops in self.tops.values_mut() {
			tops.retain(|top| *top != id);
		}
	}

	fn forget_child(&mut self, parent: InstanceId, id: InstanceId) {
		let Some(instance) = self.tree.get_mut(parent) else {
			return;
		};
		if let Some(children) = instance.children_mut() {
			children.retain(|child| *child != id);
		} else if let Some(boundary) = instance.boundary_mut() {
			boundary.content.retain(|child| *child != id);
			boundary.fallback.retain(|child| *child != id);
		}
	}

	/// Unwind an interrupt that escaped the instance it started in.
	///
	/// Suspensions go to the nearest boundary above `origin`, render errors
	/// to the nearest error boundary. An escaped suspension is handed back
	/// as `Ok(Some(_))` for the caller to abandon the pass; anything else
	/// without a handler unmounts the whole top-level tree.
	pub(crate) fn resolve_interrupt(
		&mut self,
		origin: InstanceId,
		interrupt: Interrupt,
		tx: &mut Transaction,
	) -> Result<Option<Suspension>, ReconcileError> {
		let mut origin = origin;
		let mut interrupt = interrupt;
		loop {
			let result = match interrupt {
				Interrupt::Suspended(suspension) => {
					match self.nearest_ancestor(origin, |instance, _| instance.boundary().is_some()) {
						Some(boundary) => {
							origin = boundary;
							self.show_fallback(boundary, &suspension, tx)
						}
						None => return Ok(Some(suspension)),
					}
				}
				Interrupt::Failed(ReconcileError::Render(error)) => {
					match self.nearest_ancestor(origin, Self::catches_errors) {
						Some(catcher) => {
							origin = catcher;
							self.recover_error_boundary(catcher, &error, tx)
						}
						None => {
							self.abort_top(origin, tx);
							return Err(error.into());
						}
					}
				}
				Interrupt::Failed(error) => {
					self.abort_top(origin, tx);
					return Err(error);
				}
				Interrupt::Mismatch(error) => {
					self.abort_top(origin, tx);
					return Err(error.into());
				}
			};
			match result {
				Ok(()) => return Ok(None),
				Err(next) => interrupt = next,
			}
		}
	}

	fn catches_errors(instance: &Instance, _: InstanceId) -> bool {
		match &instance.kind {
			InstanceKind::Class { handle, .. } => handle.borrow().is_error_boundary(),
			_ => false,
		}
	}

	fn nearest_ancestor(
		&self,
		origin: InstanceId,
		matches: impl Fn(&Instance, InstanceId) -> bool,
	) -> Option<InstanceId> {
		self.tree
			.ancestors(origin)
			.into_iter()
			.find(|id| self.tree.get(*id).is_some_and(|instance| matches(instance, *id)))
	}

	fn abort_top(&mut self, origin: InstanceId, tx: &mut Transaction) {
		let top = self.tree.top_of(origin);
		warn!(instance = %top, "unmounting tree after an unrecoverable interrupt");
		self.forget_top_level(top);
		self.unmount_instance(top, true, tx);
	}

	/// Undo a journaled pass and drop everything it recorded.
	fn abandon_pass(&mut self, tx: Transaction) {
		drop(tx);
		let undone = self.tree.undo_journal();
		for id in undone.created {
			self.updates.unregister(id);
		}
		self.updates.requeue(undone.dequeued);
	}

	/// End a journaled pass: commit it, or undo it entirely when a
	/// suspension escaped every boundary.
	pub(crate) fn finish_pass(
		&mut self,
		tx: Transaction,
		outcome: Result<Option<Suspension>, ReconcileError>,
	) -> Result<Option<Suspension>, ReconcileError> {
		match outcome {
			Ok(Some(suspension)) => {
				debug!(token = suspension.token().id(), "pass suspended outside of any boundary; abandoned");
				self.abandon_pass(tx);
				Ok(Some(suspension))
			}
			other => {
				self.tree.close_journal();
				self.commit(tx);
				other
			}
		}
	}
}

impl<H: HostAdapter + fmt::Debug> fmt::Debug for Reconciler<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Reconciler")
			.field("host", &self.host)
			.field("instances", &self.tree.len())
			.field("config", &self.config)
			.finish()
	}
}
