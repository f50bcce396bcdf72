//! A driver owning one reconciler and one container.
//!
//! [`Root`] is what an application talks to: hand it a descriptor, it mounts
//! or updates the tree and flushes everything that follows from that. When
//! the top of the tree suspends outside of any boundary, the root keeps the
//! container as it was, showing the last committed tree if there is one, and
//! renders again once the token resolves.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, info};

use crate::context::Context;
use crate::descriptor::Descriptor;
use crate::error::ReconcileError;
use crate::host::{HostAdapter, NodeHandle};
use crate::instance::InstanceId;
use crate::reconciler::{MountStatus, Reconciler, UpdateResult};
use crate::suspense::Suspension;

/// Renders descriptors into a single container.
pub struct Root<H: HostAdapter> {
	reconciler: Reconciler<H>,
	container: NodeHandle,
	context: Context,
	instance: Option<InstanceId>,
	element: Option<Descriptor>,
	/// Adopt existing markup on the next mount.
	hydrate: bool,
	/// Set by the resume token a suspended top-level render waits on.
	waiting: Option<Rc<Cell<bool>>>,
}

impl<H: HostAdapter> Root<H> {
	/// A root that renders into an empty container.
	pub fn new(reconciler: Reconciler<H>, container: NodeHandle) -> Self {
		Self {
			reconciler,
			container,
			context: Context::default(),
			instance: None,
			element: None,
			hydrate: false,
			waiting: None,
		}
	}

	/// A root whose first render adopts the markup already in `container`.
	pub fn hydrating(reconciler: Reconciler<H>, container: NodeHandle) -> Self {
		Self {
			hydrate: true,
			..Self::new(reconciler, container)
		}
	}

	/// Context handed to the top of the tree.
	pub fn with_context(mut self, context: Context) -> Self {
		self.context = context;
		self
	}

	/// Render `descriptor`, then flush.
	pub fn render(&mut self, descriptor: Descriptor) -> Result<(), ReconcileError> {
		self.element = Some(descriptor);
		self.waiting = None;
		self.render_current()?;
		self.flush()
	}

	/// Apply queued state updates, boundary retries and a pending top-level
	/// retry until nothing is left.
	pub fn flush(&mut self) -> Result<(), ReconcileError> {
		let limit = self.reconciler.config().max_update_depth;
		for _ in 0..limit {
			self.reconciler.flush()?;
			match &self.waiting {
				Some(fired) if fired.get() => {
					debug!(container = %self.container, "retrying suspended top-level render");
					self.waiting = None;
					self.render_current()?;
				}
				_ => return Ok(()),
			}
		}
		Err(ReconcileError::UpdateDepthExceeded(limit))
	}

	/// Tear down the tree. The container is left empty.
	pub fn unmount(&mut self) -> Result<(), ReconcileError> {
		self.element = None;
		self.waiting = None;
		match self.instance.take() {
			Some(id) if self.reconciler.is_mounted(id) => self.reconciler.unmount_component(id),
			_ => Ok(()),
		}
	}

	fn render_current(&mut self) -> Result<(), ReconcileError> {
		let Some(element) = self.element.clone() else {
			return Ok(());
		};
		let Some(id) = self.instance.filter(|id| self.reconciler.is_mounted(*id)) else {
			return self.mount_current(&element);
		};
		match self.reconciler.receive_component(id, &element, &self.context) {
			Ok(UpdateResult::Threw(suspension)) => {
				self.wait_for(&suspension);
				Ok(())
			}
			Ok(_) => Ok(()),
			Err(ReconcileError::IncompatibleDescriptor { .. }) => {
				self.reconciler.unmount_component(id)?;
				self.instance = None;
				self.mount_current(&element)
			}
			Err(error) => {
				if !self.reconciler.is_mounted(id) {
					self.instance = None;
				}
				Err(error)
			}
		}
	}

	fn mount_current(&mut self, element: &Descriptor) -> Result<(), ReconcileError> {
		let result = if self.hydrate {
			self.reconciler.hydrate(element, self.container, &self.context)?
		} else {
			self.reconciler.mount(element, self.container, &self.context)?
		};
		match result.status {
			MountStatus::Mounted => {
				info!(container = %self.container, hydrated = self.hydrate, "root mounted");
				self.hydrate = false;
				self.instance = result.instance;
			}
			MountStatus::Threw(suspension) => self.wait_for(&suspension),
		}
		Ok(())
	}

	fn wait_for(&mut self, suspension: &Suspension) {
		debug!(token = suspension.token().id(), "top-level render suspended; waiting");
		let fired = Rc::new(Cell::new(false));
		let flag = Rc::clone(&fired);
		suspension.token().on_resolve(move || flag.set(true));
		self.waiting = Some(fired);
	}

	/// Whether the root waits for a resume token before it can render.
	pub fn is_waiting(&self) -> bool {
		self.waiting.is_some()
	}

	/// The host.
	pub fn host(&self) -> &H {
		self.reconciler.host()
	}

	/// The host, mutably.
	pub fn host_mut(&mut self) -> &mut H {
		self.reconciler.host_mut()
	}

	/// The reconciler behind this root.
	pub fn reconciler(&self) -> &Reconciler<H> {
		&self.reconciler
	}

	/// The reconciler behind this root, mutably.
	pub fn reconciler_mut(&mut self) -> &mut Reconciler<H> {
		&mut self.reconciler
	}

	/// The container this root renders into.
	pub fn container(&self) -> NodeHandle {
		self.container
	}

	/// The top-level instance, once mounted.
	pub fn instance(&self) -> Option<InstanceId> {
		self.instance
	}
}
