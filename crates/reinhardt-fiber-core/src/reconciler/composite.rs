//! Function, forward-ref and class component instances.

use tracing::{trace, warn};

use crate::component::{
	ClassComponent, ComponentRef, ForwardRef, FunctionComponent, PendingUpdate, RenderOutcome,
	RenderResult, RenderScope, State, Updater,
};
use crate::context::{Context, get_masked_context};
use crate::descriptor::{Descriptor, ElementType, Node, Props};
use crate::error::{ReconcileError, RenderError};
use crate::host::{HostAdapter, NodeHandle};
use crate::hydration::HydrationCursor;
use crate::instance::{InstanceId, InstanceKind};

use super::transaction::{Effect, Transaction};
use super::{Interrupt, Position, Reconciler};

fn rendered(result: RenderResult, component: &str) -> Result<Node, Interrupt> {
	match result {
		Ok(RenderOutcome::Rendered(node)) => Ok(node),
		Ok(RenderOutcome::Suspended(suspension)) => {
			trace!(component, token = suspension.token().id(), "render suspended");
			Err(Interrupt::Suspended(suspension))
		}
		Err(error) => Err(Interrupt::render(error, component)),
	}
}

impl<H: HostAdapter> Reconciler<H> {
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn mount_function(
		&mut self,
		id: InstanceId,
		component: &FunctionComponent,
		descriptor: &Descriptor,
		position: Position,
		context: &Context,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<(), Interrupt> {
		let masked = get_masked_context(component.context_keys(), context);
		let node = rendered(component.render(descriptor.props(), &masked), component.name())?;
		let container = position.container;
		self.tree.insert(
			id,
			position.instance(
				Some(descriptor.clone()),
				context,
				InstanceKind::Function {
					component: component.clone(),
					children: Vec::new(),
				},
			),
		);
		if let Err(interrupt) = self.render_into(id, node, container, context, tx, cursor) {
			self.tree.remove(id);
			return Err(interrupt);
		}
		tx.push(Effect::Mounted(id));
		Ok(())
	}

	pub(crate) fn update_function(
		&mut self,
		id: InstanceId,
		next: &Descriptor,
		context: &Context,
		tx: &mut Transaction,
	) -> Result<(), Interrupt> {
		let Some(instance) = self.tree.get_mut(id) else {
			return Err(ReconcileError::NotMounted(id).into());
		};
		let InstanceKind::Function { component, .. } = &instance.kind else {
			return Err(ReconcileError::NotMounted(id).into());
		};
		let component = component.clone();
		instance.descriptor = Some(next.clone());
		instance.context = context.clone();
		let container = instance.container;

		let masked = get_masked_context(component.context_keys(), context);
		let node = rendered(component.render(next.props(), &masked), component.name())?;
		self.render_into(id, node, container, context, tx, &mut None)
	}

	#[allow(clippy::too_many_arguments)]
	pub(crate) fn mount_forward_ref(
		&mut self,
		id: InstanceId,
		component: &ForwardRef,
		descriptor: &Descriptor,
		position: Position,
		context: &Context,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<(), Interrupt> {
		let node = rendered(
			component.render(descriptor.props(), descriptor.node_ref()),
			component.name(),
		)?;
		let container = position.container;
		self.tree.insert(
			id,
			position.instance(
				Some(descriptor.clone()),
				context,
				InstanceKind::ForwardRef {
					children: Vec::new(),
				},
			),
		);
		if let Err(interrupt) = self.render_into(id, node, container, context, tx, cursor) {
			self.tree.remove(id);
			return Err(interrupt);
		}
		tx.push(Effect::Mounted(id));
		Ok(())
	}

	pub(crate) fn update_forward_ref(
		&mut self,
		id: InstanceId,
		next: &Descriptor,
		context: &Context,
		tx: &mut Transaction,
	) -> Result<(), Interrupt> {
		let Some(instance) = self.tree.get_mut(id) else {
			return Err(ReconcileError::NotMounted(id).into());
		};
		instance.descriptor = Some(next.clone());
		instance.context = context.clone();
		let container = instance.container;
		let ElementType::ForwardRef(component) = self.resolve_type(next.element_type())? else {
			return Err(ReconcileError::IncompatibleDescriptor {
				id,
				found: next.element_type().display_name(),
			}
			.into());
		};
		let node = rendered(component.render(next.props(), next.node_ref()), component.name())?;
		self.render_into(id, node, container, context, tx, &mut None)
	}

	#[allow(clippy::too_many_arguments)]
	pub(crate) fn mount_class(
		&mut self,
		id: InstanceId,
		class: &ClassComponent,
		descriptor: &Descriptor,
		position: Position,
		context: &Context,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<(), Interrupt> {
		let props = descriptor.props();
		let masked = get_masked_context(class.context_keys(), context);
		self.updates.register(id);
		let handle = class.construct(props, &masked, Updater::new(id, self.updates.clone()));
		let mut state = handle.borrow().initial_state(props);
		handle
			.borrow_mut()
			.will_mount(&RenderScope::new(props, &state, &masked));

		let mut queued = PendingUpdate::default();
		queued.extend(self.updates.take_for(id));
		if !queued.is_empty() {
			let applied = queued.apply(&state, props);
			state = applied.state;
			tx.effects.extend(applied.callbacks.into_iter().map(Effect::Callback));
		}

		let container = position.container;
		self.tree.insert(
			id,
			position.instance(
				Some(descriptor.clone()),
				context,
				InstanceKind::Class {
					class: class.clone(),
					handle: handle.clone(),
					state,
					children: Vec::new(),
				},
			),
		);
		if let Err(interrupt) = self.render_class(id, &handle, props, &masked, context, container, tx, cursor) {
			self.updates.unregister(id);
			self.tree.remove(id);
			return Err(interrupt);
		}
		tx.push(Effect::Mounted(id));
		Ok(())
	}

	/// Update a class instance with `next`, applying queued state.
	///
	/// `prev == next` by reference means a state-only update and skips
	/// `will_receive_props`.
	pub(crate) fn update_class(
		&mut self,
		id: InstanceId,
		prev: &Descriptor,
		next: &Descriptor,
		context: &Context,
		tx: &mut Transaction,
	) -> Result<(), Interrupt> {
		let Some(instance) = self.tree.get(id) else {
			return Err(ReconcileError::NotMounted(id).into());
		};
		let InstanceKind::Class {
			class,
			handle,
			state: prev_state,
			..
		} = &instance.kind
		else {
			return Err(ReconcileError::NotMounted(id).into());
		};
		let (class, handle, prev_state) = (class.clone(), handle.clone(), prev_state.clone());
		let container = instance.container;
		let props = next.props();
		let masked = get_masked_context(class.context_keys(), context);

		if !Descriptor::ptr_eq(prev, next) {
			handle.borrow_mut().will_receive_props(props, &masked);
		}
		let applied = self.take_pending(id).apply(&prev_state, props);
		let skip = !applied.forced
			&& handle
				.borrow()
				.should_skip_update(&RenderScope::new(props, &applied.state, &masked));
		if let Some(instance) = self.tree.get_mut(id) {
			instance.descriptor = Some(next.clone());
			instance.context = context.clone();
			if let InstanceKind::Class { state, .. } = &mut instance.kind {
				*state = applied.state.clone();
			}
		}

		if skip {
			trace!(instance = %id, component = handle.name(), "update skipped by component");
		} else {
			handle
				.borrow_mut()
				.will_update(&RenderScope::new(props, &applied.state, &masked));
			self.render_class(id, &handle, props, &masked, context, container, tx, &mut None)?;
			tx.push(Effect::DidUpdate {
				id,
				prev_props: prev.props().clone(),
				prev_state,
			});
		}
		tx.effects.extend(applied.callbacks.into_iter().map(Effect::Callback));
		Ok(())
	}

	/// Render a class instance and reconcile its output.
	///
	/// A render error from below an error boundary is handed to `did_catch`
	/// and the boundary renders once more with whatever state that produced.
	/// Errors from the boundary's own render always propagate.
	#[allow(clippy::too_many_arguments)]
	fn render_class(
		&mut self,
		id: InstanceId,
		handle: &ComponentRef,
		props: &Props,
		masked: &Context,
		context: &Context,
		container: NodeHandle,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<(), Interrupt> {
		let saved = cursor.clone();
		let node = self.invoke_class_render(id, handle, props, masked)?;
		let child_context = self.instance_child_context(id, handle, props, masked, context);
		match self.render_into(id, node, container, &child_context, tx, cursor) {
			Err(Interrupt::Failed(ReconcileError::Render(error))) if handle.borrow().is_error_boundary() => {
				*cursor = saved;
				self.catch_render_error(id, handle, props, masked, context, container, &error, tx, cursor)
			}
			other => other,
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn catch_render_error(
		&mut self,
		id: InstanceId,
		handle: &ComponentRef,
		props: &Props,
		masked: &Context,
		context: &Context,
		container: NodeHandle,
		error: &RenderError,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<(), Interrupt> {
		warn!(instance = %id, component = handle.name(), %error, "error boundary caught a render error");
		handle.borrow_mut().did_catch(error);
		self.apply_pending_now(id, props, tx);
		let node = self.invoke_class_render(id, handle, props, masked)?;
		let child_context = self.instance_child_context(id, handle, props, masked, context);
		self.render_into(id, node, container, &child_context, tx, cursor)
	}

	/// Let error boundary `id` handle `error` raised below it outside of its
	/// own render pass.
	pub(crate) fn recover_error_boundary(
		&mut self,
		id: InstanceId,
		error: &RenderError,
		tx: &mut Transaction,
	) -> Result<(), Interrupt> {
		let Some(instance) = self.tree.get(id) else {
			return Err(ReconcileError::NotMounted(id).into());
		};
		let InstanceKind::Class { class, handle, .. } = &instance.kind else {
			return Err(ReconcileError::Render(error.clone()).into());
		};
		let Some(descriptor) = instance.descriptor.clone() else {
			return Err(ReconcileError::Render(error.clone()).into());
		};
		let (handle, context, container) = (handle.clone(), instance.context.clone(), instance.container);
		let masked = get_masked_context(class.context_keys(), &context);

		for child in self.tree.take_children(id) {
			self.unmount_instance(child, true, tx);
		}
		self.catch_render_error(
			id,
			&handle,
			descriptor.props(),
			&masked,
			&context,
			container,
			error,
			tx,
			&mut None,
		)
	}

	fn invoke_class_render(
		&self,
		id: InstanceId,
		handle: &ComponentRef,
		props: &Props,
		masked: &Context,
	) -> Result<Node, Interrupt> {
		let state = self.state_of(id);
		let result = handle.borrow().render(&RenderScope::new(props, &state, masked));
		rendered(result, handle.name())
	}

	fn instance_child_context(
		&self,
		id: InstanceId,
		handle: &ComponentRef,
		props: &Props,
		masked: &Context,
		context: &Context,
	) -> Context {
		let state = self.state_of(id);
		context.merged(handle.borrow().child_context(&RenderScope::new(props, &state, masked)))
	}

	/// Context children of a class instance receive.
	pub(crate) fn class_child_context(
		&self,
		class: &ClassComponent,
		handle: &ComponentRef,
		props: &Props,
		state: &State,
		context: &Context,
	) -> Context {
		let masked = get_masked_context(class.context_keys(), context);
		context.merged(handle.borrow().child_context(&RenderScope::new(props, state, &masked)))
	}

	fn state_of(&self, id: InstanceId) -> State {
		match self.tree.get(id).map(|instance| &instance.kind) {
			Some(InstanceKind::Class { state, .. }) => state.clone(),
			_ => State::new(),
		}
	}

	/// Updates buffered on the instance plus any still in the queue.
	fn take_pending(&mut self, id: InstanceId) -> PendingUpdate {
		let mut pending = self
			.tree
			.get_mut(id)
			.and_then(|instance| instance.pending.take())
			.unwrap_or_default();
		let queued = self.updates.take_for(id);
		self.tree.note_dequeued(id, &queued);
		pending.extend(queued);
		pending
	}

	fn apply_pending_now(&mut self, id: InstanceId, props: &Props, tx: &mut Transaction) {
		let pending = self.take_pending(id);
		if pending.is_empty() {
			return;
		}
		let applied = pending.apply(&self.state_of(id), props);
		if let Some(InstanceKind::Class { state, .. }) = self.tree.get_mut(id).map(|instance| &mut instance.kind) {
			*state = applied.state;
		}
		tx.effects.extend(applied.callbacks.into_iter().map(Effect::Callback));
	}

	/// Reconcile the rendered output of a composite against its children.
	fn render_into(
		&mut self,
		id: InstanceId,
		node: Node,
		container: NodeHandle,
		context: &Context,
		tx: &mut Transaction,
		cursor: &mut Option<HydrationCursor>,
	) -> Result<(), Interrupt> {
		let old = self.tree.take_children(id);
		let children = self.reconcile_children(id, container, old, &node.into_children(), context, tx, cursor)?;
		self.tree.set_children(id, children);
		Ok(())
	}
}
