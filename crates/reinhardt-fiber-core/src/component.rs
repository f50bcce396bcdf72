//! Component definitions and local state updates.
//!
//! Three composite shapes exist:
//!
//! - [`FunctionComponent`]: `Fn(&Props, &Context) -> RenderResult`, no state
//! - [`ClassComponent`]: a factory producing a [`Component`] trait object
//!   with state, lifecycle hooks and optional error-boundary behaviour
//! - [`ForwardRef`]: a function component that receives the descriptor's ref
//!
//! Render functions return [`RenderOutcome`], which distinguishes real output
//! from a suspension signal without any unwinding.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::context::{Context, get_masked_context};
use crate::descriptor::{IntoNode, Node, Props};
use crate::error::RenderError;
use crate::instance::InstanceId;
use crate::refs::RefTarget;
use crate::suspense::{ResumeToken, Suspension};

/// Component-local state.
pub type State = Map<String, Value>;

/// What a render step produced.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
	/// Real output.
	Rendered(Node),
	/// Output is not available yet; retry once the token resolves.
	Suspended(Suspension),
}

impl RenderOutcome {
	/// Rendered output from anything convertible into a [`Node`].
	pub fn rendered(node: impl IntoNode) -> Self {
		Self::Rendered(node.into_node())
	}

	/// Suspend on `token`.
	pub fn suspended(token: &ResumeToken) -> Self {
		Self::Suspended(Suspension::new(token.clone()))
	}
}

/// Result of a render step.
pub type RenderResult = Result<RenderOutcome, RenderError>;

/// Inputs visible to a class component while rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderScope<'a> {
	props: &'a Props,
	state: &'a State,
	context: &'a Context,
}

impl<'a> RenderScope<'a> {
	/// Bundle props, state and masked context.
	pub fn new(props: &'a Props, state: &'a State, context: &'a Context) -> Self {
		Self {
			props,
			state,
			context,
		}
	}

	/// Current props.
	pub fn props(&self) -> &'a Props {
		self.props
	}

	/// Current state.
	pub fn state(&self) -> &'a State {
		self.state
	}

	/// Masked context: only the keys the component declared.
	pub fn context(&self) -> &'a Context {
		self.context
	}
}

/// A stateful component.
///
/// Only [`Component::render`] is required. Hooks run at fixed points:
/// `will_mount` before the first render, `did_mount` after the pass that
/// mounted the instance commits, `will_receive_props` when the parent hands
/// in a new descriptor, `should_skip_update` before re-rendering,
/// `will_update` / `did_update` around a re-render, `will_unmount` before the
/// subtree is torn down.
pub trait Component {
	/// Produce the child tree.
	fn render(&self, scope: &RenderScope<'_>) -> RenderResult;

	/// State before the first render.
	fn initial_state(&self, _props: &Props) -> State {
		State::new()
	}

	/// Context entries added for descendants. Recomputed on every render.
	fn child_context(&self, _scope: &RenderScope<'_>) -> Option<IndexMap<String, Value>> {
		None
	}

	/// Before the first render.
	fn will_mount(&mut self, _scope: &RenderScope<'_>) {}

	/// After the mounting pass committed.
	fn did_mount(&mut self) {}

	/// The parent supplied a new descriptor.
	fn will_receive_props(&mut self, _next_props: &Props, _context: &Context) {}

	/// Return `true` to keep the current children and skip `did_update`.
	fn should_skip_update(&self, _next: &RenderScope<'_>) -> bool {
		false
	}

	/// Before a re-render.
	fn will_update(&mut self, _next: &RenderScope<'_>) {}

	/// After an update pass committed.
	fn did_update(&mut self, _prev_props: &Props, _prev_state: &State) {}

	/// Before the instance is torn down.
	fn will_unmount(&mut self) {}

	/// Whether render failures of descendants stop here.
	fn is_error_boundary(&self) -> bool {
		false
	}

	/// A descendant failed to render. The failed subtree is already unmounted
	/// and the component renders again afterwards.
	fn did_catch(&mut self, _error: &RenderError) {}
}

type FunctionRender = dyn Fn(&Props, &Context) -> RenderResult;

struct FunctionDefinition {
	name: String,
	render: Rc<FunctionRender>,
	context_keys: Vec<&'static str>,
}

/// A stateless component defined by a render function.
#[derive(Clone)]
pub struct FunctionComponent(Rc<FunctionDefinition>);

impl FunctionComponent {
	/// Define a function component.
	pub fn new<F>(name: impl Into<String>, render: F) -> Self
	where
		F: Fn(&Props, &Context) -> RenderResult + 'static,
	{
		Self(Rc::new(FunctionDefinition {
			name: name.into(),
			render: Rc::new(render),
			context_keys: Vec::new(),
		}))
	}

	/// Declare the context keys this component reads.
	///
	/// Returns a new definition; descriptors built from the old one are a
	/// different type.
	pub fn with_context_keys(self, keys: &[&'static str]) -> Self {
		Self(Rc::new(FunctionDefinition {
			name: self.0.name.clone(),
			render: self.0.render.clone(),
			context_keys: keys.to_vec(),
		}))
	}

	/// Component name.
	pub fn name(&self) -> &str {
		&self.0.name
	}

	/// Declared context keys.
	pub fn context_keys(&self) -> &[&'static str] {
		&self.0.context_keys
	}

	/// Render with already masked context.
	pub fn render(&self, props: &Props, context: &Context) -> RenderResult {
		(self.0.render)(props, context)
	}

	/// Whether both handles are the same definition.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for FunctionComponent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("FunctionComponent").field(&self.0.name).finish()
	}
}

type ForwardRender = dyn Fn(&Props, Option<&RefTarget>) -> RenderResult;

struct ForwardRefDefinition {
	name: String,
	render: Box<ForwardRender>,
}

/// A function component that receives the ref of its descriptor and
/// decides where it ends up.
#[derive(Clone)]
pub struct ForwardRef(Rc<ForwardRefDefinition>);

impl ForwardRef {
	/// Define a forwarding component.
	pub fn new<F>(name: impl Into<String>, render: F) -> Self
	where
		F: Fn(&Props, Option<&RefTarget>) -> RenderResult + 'static,
	{
		Self(Rc::new(ForwardRefDefinition {
			name: name.into(),
			render: Box::new(render),
		}))
	}

	/// Component name.
	pub fn name(&self) -> &str {
		&self.0.name
	}

	/// Render, handing over the descriptor's ref.
	pub fn render(&self, props: &Props, node_ref: Option<&RefTarget>) -> RenderResult {
		(self.0.render)(props, node_ref)
	}

	/// Whether both handles are the same definition.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for ForwardRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ForwardRef").field(&self.0.name).finish()
	}
}

type Factory = dyn Fn(&Props, &Context, Updater) -> Box<dyn Component>;

struct ClassDefinition {
	name: String,
	factory: Rc<Factory>,
	context_keys: Vec<&'static str>,
}

/// A stateful component type: a factory creating [`Component`] objects.
#[derive(Clone)]
pub struct ClassComponent(Rc<ClassDefinition>);

impl ClassComponent {
	/// Define a class component from a constructor.
	///
	/// The constructor receives the initial props, the masked context and an
	/// [`Updater`] the component may keep to schedule state changes.
	pub fn new<C, F>(name: impl Into<String>, factory: F) -> Self
	where
		C: Component + 'static,
		F: Fn(&Props, &Context, Updater) -> C + 'static,
	{
		Self(Rc::new(ClassDefinition {
			name: name.into(),
			factory: Rc::new(move |props, context, updater| {
				Box::new(factory(props, context, updater)) as Box<dyn Component>
			}),
			context_keys: Vec::new(),
		}))
	}

	/// Declare the context keys instances read.
	pub fn with_context_keys(self, keys: &[&'static str]) -> Self {
		Self(Rc::new(ClassDefinition {
			name: self.0.name.clone(),
			factory: self.0.factory.clone(),
			context_keys: keys.to_vec(),
		}))
	}

	/// Component name.
	pub fn name(&self) -> &str {
		&self.0.name
	}

	/// Declared context keys.
	pub fn context_keys(&self) -> &[&'static str] {
		&self.0.context_keys
	}

	/// Run the constructor.
	pub(crate) fn construct(&self, props: &Props, context: &Context, updater: Updater) -> ComponentRef {
		ComponentRef {
			name: Rc::from(self.0.name.as_str()),
			component: Rc::new(RefCell::new((self.0.factory)(props, context, updater))),
		}
	}

	/// Whether both handles are the same definition.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for ClassComponent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ClassComponent").field(&self.0.name).finish()
	}
}

/// Shared handle to a live class component object. This is the public
/// instance that refs on class components receive.
#[derive(Clone)]
pub struct ComponentRef {
	name: Rc<str>,
	component: Rc<RefCell<Box<dyn Component>>>,
}

impl ComponentRef {
	/// Name of the component's class.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Borrow the component object.
	pub fn borrow(&self) -> Ref<'_, Box<dyn Component>> {
		self.component.borrow()
	}

	/// Mutably borrow the component object.
	pub fn borrow_mut(&self) -> RefMut<'_, Box<dyn Component>> {
		self.component.borrow_mut()
	}

	/// Whether both handles point at the same object.
	pub fn ptr_eq(a: &ComponentRef, b: &ComponentRef) -> bool {
		Rc::ptr_eq(&a.component, &b.component)
	}
}

impl fmt::Debug for ComponentRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ComponentRef").field(&self.name).finish()
	}
}

type StateFn = dyn Fn(&State, &Props) -> State;

/// Completion callback of a state update. Copies of an update share it, and
/// it runs at most once.
#[derive(Clone)]
pub(crate) struct StateCallback(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl StateCallback {
	fn new(callback: impl FnOnce() + 'static) -> Self {
		Self(Rc::new(RefCell::new(Some(Box::new(callback)))))
	}

	pub(crate) fn run(&self) {
		let callback = self.0.borrow_mut().take();
		if let Some(callback) = callback {
			callback();
		}
	}
}

#[derive(Clone)]
pub(crate) enum StateChange {
	Merge(State),
	Update(Rc<StateFn>),
	Replace(State),
	Force,
}

#[derive(Clone)]
pub(crate) struct StateUpdate {
	change: StateChange,
	callback: Option<StateCallback>,
}

/// Updates buffered on an instance until it re-renders.
#[derive(Clone, Default)]
pub(crate) struct PendingUpdate {
	updates: Vec<StateUpdate>,
}

/// The outcome of folding a [`PendingUpdate`] into state.
pub(crate) struct AppliedUpdate {
	pub(crate) state: State,
	pub(crate) forced: bool,
	pub(crate) callbacks: Vec<StateCallback>,
}

impl PendingUpdate {
	pub(crate) fn extend(&mut self, updates: impl IntoIterator<Item = StateUpdate>) {
		self.updates.extend(updates);
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.updates.is_empty()
	}

	/// Apply the buffered updates in order on top of `state`.
	pub(crate) fn apply(self, state: &State, props: &Props) -> AppliedUpdate {
		let mut next = state.clone();
		let mut forced = false;
		let mut callbacks = Vec::new();
		for update in self.updates {
			match update.change {
				StateChange::Merge(partial) => next.extend(partial),
				StateChange::Update(f) => {
					let partial = f(&next, props);
					next.extend(partial);
				}
				StateChange::Replace(state) => next = state,
				StateChange::Force => forced = true,
			}
			callbacks.extend(update.callback);
		}
		AppliedUpdate {
			state: next,
			forced,
			callbacks,
		}
	}
}

#[derive(Default)]
struct QueueState {
	updates: Vec<(InstanceId, StateUpdate)>,
	mounted: HashSet<InstanceId>,
}

/// Shared queue of state updates issued through [`Updater`]s.
///
/// Updates are only recorded here; a reconciler flush or the owner of a
/// detached component applies them.
#[derive(Clone, Default)]
pub(crate) struct UpdateQueue(Rc<RefCell<QueueState>>);

impl UpdateQueue {
	pub(crate) fn register(&self, id: InstanceId) {
		self.0.borrow_mut().mounted.insert(id);
	}

	pub(crate) fn unregister(&self, id: InstanceId) {
		let mut state = self.0.borrow_mut();
		state.mounted.remove(&id);
		state.updates.retain(|(target, _)| *target != id);
	}

	pub(crate) fn is_registered(&self, id: InstanceId) -> bool {
		self.0.borrow().mounted.contains(&id)
	}

	fn push(&self, id: InstanceId, update: StateUpdate) {
		let mut state = self.0.borrow_mut();
		if !state.mounted.contains(&id) {
			tracing::warn!(instance = %id, "state update on an unmounted component dropped");
			return;
		}
		state.updates.push((id, update));
	}

	/// Remove and return queued updates for one instance.
	pub(crate) fn take_for(&self, id: InstanceId) -> Vec<StateUpdate> {
		let mut state = self.0.borrow_mut();
		let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.updates)
			.into_iter()
			.partition(|(target, _)| *target == id);
		state.updates = kept;
		taken.into_iter().map(|(_, update)| update).collect()
	}

	pub(crate) fn has_updates_for(&self, id: InstanceId) -> bool {
		self.0.borrow().updates.iter().any(|(target, _)| *target == id)
	}

	/// Put updates taken by an abandoned pass back in front of the queue.
	pub(crate) fn requeue(&self, updates: Vec<(InstanceId, StateUpdate)>) {
		if updates.is_empty() {
			return;
		}
		let mut state = self.0.borrow_mut();
		let later = std::mem::replace(&mut state.updates, updates);
		state.updates.extend(later);
	}

	/// Remove and return everything queued.
	pub(crate) fn drain(&self) -> Vec<(InstanceId, StateUpdate)> {
		std::mem::take(&mut self.0.borrow_mut().updates)
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.0.borrow().updates.is_empty()
	}
}

/// Handle a class component uses to schedule changes to its own state.
///
/// Calls only enqueue; nothing re-renders until the owning reconciler is
/// flushed. Updates issued during `will_mount` are folded into the initial
/// state before the first render.
#[derive(Clone)]
pub struct Updater {
	id: InstanceId,
	queue: UpdateQueue,
}

impl Updater {
	pub(crate) fn new(id: InstanceId, queue: UpdateQueue) -> Self {
		Self { id, queue }
	}

	/// Shallow-merge `partial` into the state.
	pub fn set_state(&self, partial: State) {
		self.enqueue(StateChange::Merge(partial), None);
	}

	/// Like [`Updater::set_state`], running `callback` once the update committed.
	pub fn set_state_then(&self, partial: State, callback: impl FnOnce() + 'static) {
		self.enqueue(StateChange::Merge(partial), Some(StateCallback::new(callback)));
	}

	/// Compute a partial state from the state and props current at apply time.
	///
	/// `f` may run more than once when a render that applied it is abandoned
	/// and redone, so it should not have side effects.
	pub fn update_state(&self, f: impl Fn(&State, &Props) -> State + 'static) {
		self.enqueue(StateChange::Update(Rc::new(f)), None);
	}

	/// Replace the state entirely.
	pub fn replace_state(&self, state: State) {
		self.enqueue(StateChange::Replace(state), None);
	}

	/// Re-render even if `should_skip_update` would say otherwise.
	pub fn force_update(&self) {
		self.enqueue(StateChange::Force, None);
	}

	/// Like [`Updater::force_update`], running `callback` once committed.
	pub fn force_update_then(&self, callback: impl FnOnce() + 'static) {
		self.enqueue(StateChange::Force, Some(StateCallback::new(callback)));
	}

	/// Whether the component is still mounted.
	pub fn is_mounted(&self) -> bool {
		self.queue.is_registered(self.id)
	}

	fn enqueue(&self, change: StateChange, callback: Option<StateCallback>) {
		tracing::trace!(instance = %self.id, "state update queued");
		self.queue.push(self.id, StateUpdate { change, callback });
	}
}

impl fmt::Debug for Updater {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Updater").field("instance", &self.id).finish()
	}
}

/// A class component instantiated outside a live instance tree.
///
/// Used by server rendering and shallow rendering: it runs the constructor,
/// `initial_state` and `will_mount` (folding updates queued there into the
/// state) but never mounts children.
pub struct DetachedComponent {
	id: InstanceId,
	class: ClassComponent,
	handle: ComponentRef,
	state: State,
	props: Props,
	context: Context,
	queue: UpdateQueue,
}

impl DetachedComponent {
	/// Construct and prepare a component for its first render.
	pub fn construct(class: &ClassComponent, props: &Props, context: &Context) -> Self {
		let id = InstanceId::next();
		let queue = UpdateQueue::default();
		queue.register(id);
		let masked = get_masked_context(class.context_keys(), context);
		let handle = class.construct(props, &masked, Updater::new(id, queue.clone()));
		let state = handle.borrow().initial_state(props);
		let mut detached = Self {
			id,
			class: class.clone(),
			handle,
			state,
			props: props.clone(),
			context: masked,
			queue,
		};
		detached
			.handle
			.borrow_mut()
			.will_mount(&RenderScope::new(&detached.props, &detached.state, &detached.context));
		detached.apply_queued();
		detached
	}

	/// The component object.
	pub fn handle(&self) -> &ComponentRef {
		&self.handle
	}

	/// Current state.
	pub fn state(&self) -> &State {
		&self.state
	}

	/// Props the component was last given.
	pub fn props(&self) -> &Props {
		&self.props
	}

	/// Render with the current props, state and masked context.
	pub fn render(&self) -> RenderResult {
		let scope = RenderScope::new(&self.props, &self.state, &self.context);
		self.handle
			.borrow()
			.render(&scope)
			.map_err(|error| error.in_component(self.class.name()))
	}

	/// Context for the children of this component, merged over `ambient`.
	pub fn child_context(&self, ambient: &Context) -> Context {
		let scope = RenderScope::new(&self.props, &self.state, &self.context);
		ambient.merged(self.handle.borrow().child_context(&scope))
	}

	/// Hand in new props and context. Returns whether a re-render is due.
	pub fn receive(&mut self, props: &Props, context: &Context) -> bool {
		let masked = get_masked_context(self.class.context_keys(), context);
		self.handle.borrow_mut().will_receive_props(props, &masked);
		let mut pending = PendingUpdate::default();
		pending.extend(self.queue.take_for(self.id));
		self.update(props.clone(), masked, pending)
	}

	/// Apply queued state updates. Returns whether a re-render is due.
	pub fn flush(&mut self) -> bool {
		if self.queue.is_empty() {
			return false;
		}
		let mut pending = PendingUpdate::default();
		pending.extend(self.queue.take_for(self.id));
		self.update(self.props.clone(), self.context.clone(), pending)
	}

	/// Run `will_unmount`; updates issued afterwards are dropped.
	pub fn unmount(self) {
		self.handle.borrow_mut().will_unmount();
		self.queue.unregister(self.id);
	}

	fn update(&mut self, props: Props, context: Context, pending: PendingUpdate) -> bool {
		let applied = pending.apply(&self.state, &props);
		let skip = !applied.forced
			&& self
				.handle
				.borrow()
				.should_skip_update(&RenderScope::new(&props, &applied.state, &context));
		if !skip {
			self.handle
				.borrow_mut()
				.will_update(&RenderScope::new(&props, &applied.state, &context));
		}
		self.props = props;
		self.state = applied.state;
		self.context = context;
		for callback in applied.callbacks {
			callback.run();
		}
		!skip
	}

	fn apply_queued(&mut self) {
		let mut pending = PendingUpdate::default();
		pending.extend(self.queue.take_for(self.id));
		if pending.is_empty() {
			return;
		}
		let applied = pending.apply(&self.state, &self.props);
		self.state = applied.state;
		for callback in applied.callbacks {
			callback.run();
		}
	}
}

impl fmt::Debug for DetachedComponent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DetachedComponent")
			.field("class", &self.class.name())
			.field("state", &self.state)
			.finish()
	}
}
