//! Hydration coordinator.
//!
//! Server markup is adopted node by node while mounting. Suspense boundaries
//! get special treatment: their region of markup is located by its markers
//! and hydrated as a unit. When the content of a boundary suspends, the
//! boundary stays [`BoundaryState::Dehydrated`] and the server markup is left
//! untouched; resolving the token pings the boundary for another attempt.
//!
//! ```text
//! Dehydrated --attempt--> Hydrating --ok--------> Hydrated
//!     ^                       |
//!     +-------suspended-------+
//!     |                       +--mismatch--> Discarded (client render)
//!     +--new props before hydration--------> Discarded (client render)
//! ```

pub mod markers;
mod cursor;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, debug_span, trace, warn};

use crate::context::Context;
use crate::descriptor::Descriptor;
use crate::error::{HydrationError, ReconcileError};
use crate::host::{HostAdapter, HostNodeInfo, NodeHandle};
use crate::instance::{Instance, InstanceId, InstanceKind};
use crate::reconciler::transaction::{Effect, HostPatch, Teardown, Transaction};
use crate::reconciler::{Interrupt, Position, Reconciler};
use crate::suspense::Suspension;

pub(crate) use cursor::{HydrationCursor, MarkupRegion};
use markers::{Marker, parse_marker};

/// Hydration state of a suspense boundary that started from server markup.
///
/// Boundaries mounted purely on the client have no hydration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryState {
	/// Server markup is in place and no instances exist for the content.
	Dehydrated,
	/// A hydration attempt is in progress.
	Hydrating,
	/// The content instances adopted the server markup.
	Hydrated,
	/// The server markup was dropped and the content rendered on the client.
	Discarded,
}

/// Instance data of a suspense boundary.
#[derive(Debug, Clone, Default)]
pub(crate) struct BoundaryInstance {
	pub(crate) state: Option<BoundaryState>,
	/// Server markup region, kept while dehydrated or hydrated.
	pub(crate) region: Option<MarkupRegion>,
	pub(crate) content: Vec<InstanceId>,
	pub(crate) fallback: Vec<InstanceId>,
	pub(crate) showing_fallback: bool,
	/// Bumped whenever a ping registered earlier must be ignored.
	pub(crate) attempt: u64,
}

impl BoundaryInstance {
	/// Children currently contributing host nodes.
	pub(crate) fn shown(&self) -> &[InstanceId] {
		if self.showing_fallback {
			&self.fallback
		} else {
			&self.content
		}
	}
}

/// A resolved resume token asking `boundary` to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ping {
	pub(crate) boundary: InstanceId,
	pub(crate) attempt: u64,
}

/// Pings delivered by resume tokens, drained by [`Reconciler::flush`].
#[derive(Debug, Clone, Default)]
pub(crate) struct PingQueue(Rc<RefCell<Vec<Ping>>>);

impl PingQueue {
	pub(crate) fn push(&self, ping: Ping) {
		self.0.borrow_mut().push(ping);
	}

	pub(crate) fn drain(&self) -> Vec<Ping> {
		std::mem::take(&mut *self.0.borrow_mut())
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.0.borrow().is_empty()
	}
}

fn mismatch(expected: &str, found: String) -> Interrupt {
	Interrupt::Mismatch(HydrationError::StructureMismatch {
		expected: expected.to_string(),
		found,
	})
}

impl<H: HostAdapter> Reconciler<H> {
	pub(crate) fn mount_boundary(
		&mut self,
		id: InstanceId,
		descriptor: &Descriptor,
		position: Position,
		context: &Context,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<(), Interrupt> {
		let container = position.container;
		self.tree.insert(
			id,
			position.instance(
				Some(descriptor.clone()),
				context,
				InstanceKind::Suspense(Box::default()),
			),
		);
		let result = match cursor.as_mut() {
			Some(cursor) => self.begin_hydration(id, cursor, tx),
			None => self.render_boundary_content(id, tx),
		};
		if let Err(interrupt) = result {
			self.unmount_instance(id, false, tx);
			return Err(interrupt);
		}
		tx.mark_dirty(container);
		tx.push(Effect::Mounted(id));
		Ok(())
	}

	fn begin_hydration(
		&mut self,
		id: InstanceId,
		cursor: &mut HydrationCursor,
		tx: &mut Transaction,
	) -> Result<(), Interrupt> {
		let (start, marker) = match cursor.peek(&self.host) {
			Some((node, HostNodeInfo::Comment(data))) => match parse_marker(&data) {
				Some(marker) if marker.is_start() => (node, marker),
				_ => return Err(mismatch("suspense boundary", format!("comment {data:?}"))),
			},
			Some((_, info)) => return Err(mismatch("suspense boundary", info.summary())),
			None => {
				return Err(Interrupt::Mismatch(HydrationError::MissingNode {
					expected: "suspense boundary".to_string(),
				}));
			}
		};
		let region = MarkupRegion::find(&self.host, cursor.parent, start)
			.ok_or(Interrupt::Mismatch(HydrationError::UnterminatedBoundary))?;
		cursor.advance_past(&self.host, region.end);
		if let Some(boundary) = self.boundary_mut(id) {
			boundary.state = Some(BoundaryState::Dehydrated);
			boundary.region = Some(region);
		}
		debug!(boundary = %id, ?marker, "found dehydrated boundary");
		match marker {
			Marker::Start => self.attempt_hydration(id, tx),
			_ => self.discard_markup_and_render(id, tx),
		}
	}

	/// Try to adopt the region's markup with the current content descriptors.
	fn attempt_hydration(&mut self, id: InstanceId, tx: &mut Transaction) -> Result<(), Interrupt> {
		let Some((descriptor, context, _)) = self.boundary_inputs(id) else {
			return Ok(());
		};
		let Some(region) = self.boundary_mut(id).and_then(|boundary| {
			boundary.state = Some(BoundaryState::Hydrating);
			boundary.region
		}) else {
			return Ok(());
		};
		let _span = debug_span!("hydrate_boundary", boundary = %id).entered();
		let checkpoint = tx.checkpoint();
		let mut cursor = Some(HydrationCursor::within(&self.host, &region));
		let result = self.reconcile_children(
			id,
			region.container,
			Vec::new(),
			descriptor.props().children(),
			&context,
			tx,
			&mut cursor,
		);
		match result {
			Ok(content) => {
				if let Some(cursor) = &cursor {
					self.discard_unclaimed(cursor, tx);
				}
				if let Some(boundary) = self.boundary_mut(id) {
					boundary.content = content;
					boundary.state = Some(BoundaryState::Hydrated);
					boundary.attempt += 1;
				}
				tx.mark_dirty(region.container);
				debug!("boundary hydrated");
				Ok(())
			}
			Err(Interrupt::Suspended(suspension)) => {
				tx.rollback(checkpoint);
				self.set_boundary_state(id, BoundaryState::Dehydrated);
				debug!("boundary content suspended; keeping server markup");
				self.register_ping(id, &suspension);
				Ok(())
			}
			Err(Interrupt::Mismatch(error)) => {
				tx.rollback(checkpoint);
				warn!(boundary = %id, %error, "hydration mismatch; discarding server markup");
				self.discard_markup_and_render(id, tx)
			}
			Err(interrupt) => {
				tx.rollback(checkpoint);
				self.set_boundary_state(id, BoundaryState::Dehydrated);
				Err(interrupt)
			}
		}
	}

	/// Drop the server markup of a boundary and render it on the client.
	fn discard_markup_and_render(&mut self, id: InstanceId, tx: &mut Transaction) -> Result<(), Interrupt> {
		let region = self.boundary_mut(id).and_then(|boundary| {
			boundary.state = Some(BoundaryState::Discarded);
			boundary.attempt += 1;
			boundary.region.take()
		});
		if let Some(region) = region {
			for node in region.nodes(&self.host) {
				tx.patch(HostPatch::Remove {
					parent: region.container,
					node,
				});
			}
			tx.mark_dirty(region.container);
		}
		self.render_boundary_content(id, tx)
	}

	fn render_boundary_content(&mut self, id: InstanceId, tx: &mut Transaction) -> Result<(), Interrupt> {
		let Some((descriptor, context, container)) = self.boundary_inputs(id) else {
			return Ok(());
		};
		let checkpoint = tx.checkpoint();
		let result = self.reconcile_children(
			id,
			container,
			Vec::new(),
			descriptor.props().children(),
			&context,
			tx,
			&mut None,
		);
		match result {
			Ok(content) => {
				if let Some(boundary) = self.boundary_mut(id) {
					boundary.content = content;
					boundary.showing_fallback = false;
				}
				tx.mark_dirty(container);
				Ok(())
			}
			Err(Interrupt::Suspended(suspension)) => {
				tx.rollback(checkpoint);
				self.show_fallback(id, &suspension, tx)
			}
			Err(interrupt) => Err(interrupt),
		}
	}

	/// Replace whatever the boundary shows with its fallback and wait for
	/// `suspension` to resolve.
	pub(crate) fn show_fallback(
		&mut self,
		id: InstanceId,
		suspension: &Suspension,
		tx: &mut Transaction,
	) -> Result<(), Interrupt> {
		let Some((descriptor, context, container)) = self.boundary_inputs(id) else {
			return Ok(());
		};
		let (content, previous) = match self.boundary_mut(id) {
			Some(boundary) => (
				std::mem::take(&mut boundary.content),
				std::mem::take(&mut boundary.fallback),
			),
			None => return Ok(()),
		};
		for child in content {
			self.unmount_instance(child, true, tx);
		}
		let fallback = self.reconcile_children(
			id,
			container,
			previous,
			&descriptor.fallback_node().clone().into_children(),
			&context,
			tx,
			&mut None,
		)?;
		if let Some(boundary) = self.boundary_mut(id) {
			boundary.fallback = fallback;
			boundary.showing_fallback = true;
		}
		debug!(boundary = %id, "showing fallback");
		self.register_ping(id, suspension);
		tx.mark_dirty(container);
		Ok(())
	}

	/// Arrange for `suspension` resolving to retry boundary `id`.
	fn register_ping(&mut self, id: InstanceId, suspension: &Suspension) {
		let Some(boundary) = self.boundary_mut(id) else {
			return;
		};
		boundary.attempt += 1;
		let attempt = boundary.attempt;
		let pings = self.pings.clone();
		trace!(boundary = %id, attempt, token = suspension.token().id(), "waiting for resume token");
		suspension.token().on_resolve(move || {
			pings.push(Ping {
				boundary: id,
				attempt,
			})
		});
	}

	/// Render the content of a boundary that currently shows its fallback.
	fn retry_content(&mut self, id: InstanceId, tx: &mut Transaction) -> Result<(), Interrupt> {
		let Some((descriptor, context, container)) = self.boundary_inputs(id) else {
			return Ok(());
		};
		let checkpoint = tx.checkpoint();
		let result = self.reconcile_children(
			id,
			container,
			Vec::new(),
			descriptor.props().children(),
			&context,
			tx,
			&mut None,
		);
		match result {
			Ok(content) => {
				let fallback = match self.boundary_mut(id) {
					Some(boundary) => {
						boundary.content = content;
						boundary.showing_fallback = false;
						boundary.attempt += 1;
						std::mem::take(&mut boundary.fallback)
					}
					None => Vec::new(),
				};
				for child in fallback {
					self.unmount_instance(child, true, tx);
				}
				tx.mark_dirty(container);
				debug!(boundary = %id, "boundary content resolved");
				Ok(())
			}
			Err(Interrupt::Suspended(suspension)) => {
				tx.rollback(checkpoint);
				self.show_fallback(id, &suspension, tx)
			}
			Err(interrupt) => Err(interrupt),
		}
	}

	/// Handle a ping from a resolved resume token.
	pub(crate) fn retry_boundary(&mut self, ping: Ping) -> Result<(), ReconcileError> {
		let current = self
			.tree
			.get(ping.boundary)
			.and_then(Instance::boundary)
			.map(|boundary| (boundary.attempt, boundary.state, boundary.showing_fallback));
		let Some((attempt, state, showing_fallback)) = current else {
			debug!(boundary = %ping.boundary, "ping for an unmounted boundary ignored");
			return Ok(());
		};
		if attempt != ping.attempt {
			debug!(boundary = %ping.boundary, "stale ping ignored");
			return Ok(());
		}
		let _span = debug_span!("retry_boundary", boundary = %ping.boundary).entered();
		self.tree.open_journal();
		let mut tx = Transaction::default();
		let result = match state {
			Some(BoundaryState::Dehydrated) => self.attempt_hydration(ping.boundary, &mut tx),
			_ if showing_fallback => self.retry_content(ping.boundary, &mut tx),
			_ => Ok(()),
		};
		let outcome = match result {
			Ok(()) => Ok(None),
			Err(interrupt) => self.resolve_interrupt(ping.boundary, interrupt, &mut tx),
		};
		match self.finish_pass(tx, outcome)? {
			Some(_) => Err(ReconcileError::SuspendedOutsideBoundary),
			None => Ok(()),
		}
	}

	/// New descriptor for an existing boundary.
	pub(crate) fn update_boundary(
		&mut self,
		id: InstanceId,
		prev: &Descriptor,
		prev_context: &Context,
		next: &Descriptor,
		context: &Context,
		tx: &mut Transaction,
	) -> Result<(), Interrupt> {
		let Some(instance) = self.tree.get_mut(id) else {
			return Ok(());
		};
		instance.descriptor = Some(next.clone());
		instance.context = context.clone();
		let container = instance.container;
		let Some((state, showing_fallback)) = instance
			.boundary()
			.map(|boundary| (boundary.state, boundary.showing_fallback))
		else {
			return Ok(());
		};

		match state {
			Some(BoundaryState::Dehydrated | BoundaryState::Hydrating) => {
				if prev == next && prev_context == context {
					trace!(boundary = %id, "boundary still dehydrated; inputs unchanged");
					return Ok(());
				}
				debug!(boundary = %id, "new inputs before hydration; discarding server markup");
				self.discard_markup_and_render(id, tx)
			}
			_ if showing_fallback => self.retry_content(id, tx),
			_ => {
				let checkpoint = tx.checkpoint();
				let old = self
					.boundary_mut(id)
					.map(|boundary| std::mem::take(&mut boundary.content))
					.unwrap_or_default();
				let result =
					self.reconcile_children(id, container, old, next.props().children(), context, tx, &mut None);
				match result {
					Ok(content) => {
						if let Some(boundary) = self.boundary_mut(id) {
							boundary.content = content;
						}
						Ok(())
					}
					Err(Interrupt::Suspended(suspension)) => {
						tx.rollback(checkpoint);
						self.show_fallback(id, &suspension, tx)
					}
					Err(interrupt) => Err(interrupt),
				}
			}
		}
	}

	/// Tear down a boundary whose instance was already removed from the tree.
	pub(crate) fn unmount_boundary(
		&mut self,
		boundary: BoundaryInstance,
		committed: bool,
		detach_host: bool,
		tx: &mut Transaction,
	) {
		for child in boundary.content.into_iter().chain(boundary.fallback) {
			self.unmount_instance(child, detach_host, tx);
		}
		let Some(region) = boundary.region else {
			return;
		};
		if !(committed && detach_host) {
			return;
		}
		let nodes = match boundary.state {
			Some(BoundaryState::Dehydrated | BoundaryState::Hydrating) => region.nodes(&self.host),
			_ => vec![region.start, region.end],
		};
		for node in nodes {
			tx.tear_down(Teardown::Remove {
				parent: region.container,
				node,
			});
		}
	}

	/// Host nodes a boundary contributes to its container.
	pub(crate) fn collect_boundary_nodes(&self, boundary: &BoundaryInstance, out: &mut Vec<NodeHandle>) {
		match (boundary.state, &boundary.region) {
			(Some(BoundaryState::Dehydrated | BoundaryState::Hydrating), Some(region)) => {
				out.extend(region.nodes(&self.host));
			}
			(Some(BoundaryState::Hydrated), Some(region)) => {
				out.push(region.start);
				for child in boundary.shown() {
					self.collect_host_nodes(*child, out);
				}
				out.push(region.end);
			}
			_ => {
				for child in boundary.shown() {
					self.collect_host_nodes(*child, out);
				}
			}
		}
	}

	/// Queue removal of markup nothing claimed, when configured to.
	pub(crate) fn discard_unclaimed(&self, cursor: &HydrationCursor, tx: &mut Transaction) {
		if !self.config.remove_unmatched_markup {
			return;
		}
		for node in cursor.remaining(&self.host) {
			if let Some(info) = self.host.describe(node) {
				if !matches!(info, HostNodeInfo::Comment(_)) {
					warn!(%node, found = %info.summary(), "removing server markup with no matching element");
				}
			}
			tx.patch(HostPatch::Remove {
				parent: cursor.parent,
				node,
			});
		}
	}

	fn boundary_mut(&mut self, id: InstanceId) -> Option<&mut BoundaryInstance> {
		self.tree.get_mut(id).and_then(Instance::boundary_mut)
	}

	fn set_boundary_state(&mut self, id: InstanceId, state: BoundaryState) {
		if let Some(boundary) = self.boundary_mut(id) {
			boundary.state = Some(state);
		}
	}

	fn boundary_inputs(&self, id: InstanceId) -> Option<(Descriptor, Context, NodeHandle)> {
		let instance = self.tree.get(id)?;
		Some((
			instance.descriptor.clone()?,
			instance.context.clone(),
			instance.container,
		))
	}
}
