//! The live instance tree.
//!
//! Instances live in an arena keyed by [`InstanceId`]. Children are owned by
//! their parent's child list; the `parent` link is a plain id and never keeps
//! anything alive. Ids come from a process-wide counter and are never reused,
//! so a stale id (for example inside a late ping) simply fails to resolve.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::component::{ClassComponent, ComponentRef, FunctionComponent, PendingUpdate, State, StateUpdate};
use crate::context::Context;
use crate::descriptor::{Descriptor, Key, Node};
use crate::host::NodeHandle;
use crate::hydration::BoundaryInstance;
use crate::refs::RefTarget;

static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a mounted instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
	/// Allocate a fresh, never reused id.
	pub(crate) fn next() -> Self {
		Self(INSTANCE_COUNTER.fetch_add(1, Ordering::SeqCst))
	}

	/// The raw numeric id.
	pub fn raw(&self) -> u64 {
		self.0
	}
}

impl fmt::Display for InstanceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Position identity of a child within its sibling list.
///
/// Keyed children match by key wherever they move; unkeyed children match
/// strictly by index, so inserting an unkeyed sibling shifts the identity of
/// every unkeyed sibling after it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Slot {
	Keyed(Key),
	Index(usize),
}

impl Slot {
	pub(crate) fn for_node(node: &Node, index: usize) -> Self {
		match node.as_descriptor().and_then(Descriptor::key_ref) {
			Some(key) => Slot::Keyed(key.clone()),
			None => Slot::Index(index),
		}
	}
}

/// Per-shape data of an instance.
#[derive(Clone)]
pub(crate) enum InstanceKind {
	Host {
		node: NodeHandle,
		children: Vec<InstanceId>,
	},
	Text {
		node: NodeHandle,
		text: String,
	},
	Fragment {
		children: Vec<InstanceId>,
	},
	Function {
		component: FunctionComponent,
		children: Vec<InstanceId>,
	},
	Class {
		class: ClassComponent,
		handle: ComponentRef,
		state: State,
		children: Vec<InstanceId>,
	},
	ForwardRef {
		children: Vec<InstanceId>,
	},
	Suspense(Box<BoundaryInstance>),
}

/// Which update procedure an instance takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
	Host,
	Text,
	Fragment,
	Function,
	Class,
	ForwardRef,
	Suspense,
}

impl InstanceKind {
	pub(crate) fn shape(&self) -> Shape {
		match self {
			InstanceKind::Host { .. } => Shape::Host,
			InstanceKind::Text { .. } => Shape::Text,
			InstanceKind::Fragment { .. } => Shape::Fragment,
			InstanceKind::Function { .. } => Shape::Function,
			InstanceKind::Class { .. } => Shape::Class,
			InstanceKind::ForwardRef { .. } => Shape::ForwardRef,
			InstanceKind::Suspense(_) => Shape::Suspense,
		}
	}
}

#[derive(Clone)]
pub(crate) struct Instance {
	pub(crate) parent: Option<InstanceId>,
	/// Host node this instance's host nodes are placed into.
	pub(crate) container: NodeHandle,
	pub(crate) slot: Slot,
	/// `None` for text and fragment instances.
	pub(crate) descriptor: Option<Descriptor>,
	/// Last applied, unmasked parent context.
	pub(crate) context: Context,
	pub(crate) kind: InstanceKind,
	/// Ref target currently holding this instance's public handle.
	pub(crate) attached_ref: Option<RefTarget>,
	pub(crate) pending: Option<PendingUpdate>,
	/// Set once the pass that created the instance commits.
	pub(crate) committed: bool,
}

impl Instance {
	pub(crate) fn new(
		parent: Option<InstanceId>,
		container: NodeHandle,
		slot: Slot,
		descriptor: Option<Descriptor>,
		context: Context,
		kind: InstanceKind,
	) -> Self {
		Self {
			parent,
			container,
			slot,
			descriptor,
			context,
			kind,
			attached_ref: None,
			pending: None,
			committed: false,
		}
	}

	/// Child instances of composite, host and fragment instances.
	///
	/// Suspense boundaries keep content and fallback apart and are handled
	/// by the hydration coordinator.
	pub(crate) fn children(&self) -> Option<&Vec<InstanceId>> {
		match &self.kind {
			InstanceKind::Host { children, .. }
			| InstanceKind::Fragment { children }
			| InstanceKind::Function { children, .. }
			| InstanceKind::Class { children, .. }
			| InstanceKind::ForwardRef { children } => Some(children),
			InstanceKind::Text { .. } | InstanceKind::Suspense(_) => None,
		}
	}

	pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<InstanceId>> {
		match &mut self.kind {
			InstanceKind::Host { children, .. }
			| InstanceKind::Fragment { children }
			| InstanceKind::Function { children, .. }
			| InstanceKind::Class { children, .. }
			| InstanceKind::ForwardRef { children } => Some(children),
			InstanceKind::Text { .. } | InstanceKind::Suspense(_) => None,
		}
	}

	pub(crate) fn boundary(&self) -> Option<&BoundaryInstance> {
		match &self.kind {
			InstanceKind::Suspense(boundary) => Some(boundary),
			_ => None,
		}
	}

	pub(crate) fn boundary_mut(&mut self) -> Option<&mut BoundaryInstance> {
		match &mut self.kind {
			InstanceKind::Suspense(boundary) => Some(boundary),
			_ => None,
		}
	}
}

/// Arena of live instances, plus the host instance owning each element node.
///
/// While a journal is open, the first change to an instance or owner entry
/// saves what was there before, so that an abandoned pass can be undone.
#[derive(Default)]
pub(crate) struct InstanceTree {
	instances: HashMap<InstanceId, Instance>,
	owners: HashMap<NodeHandle, InstanceId>,
	journal: Option<Journal>,
}

#[derive(Default)]
struct Journal {
	instances: HashMap<InstanceId, Option<Instance>>,
	owners: HashMap<NodeHandle, Option<InstanceId>>,
	dequeued: Vec<(InstanceId, StateUpdate)>,
}

/// What undoing a journal handed back to the caller.
pub(crate) struct Undone {
	/// Instances created by the abandoned pass.
	pub(crate) created: Vec<InstanceId>,
	/// State updates the abandoned pass took off the update queue.
	pub(crate) dequeued: Vec<(InstanceId, StateUpdate)>,
}

impl InstanceTree {
	/// Start recording changes. An already open journal is kept.
	pub(crate) fn open_journal(&mut self) {
		self.journal.get_or_insert_with(Journal::default);
	}

	/// Keep every change made since the journal was opened.
	pub(crate) fn close_journal(&mut self) {
		self.journal = None;
	}

	/// Put back everything changed since the journal was opened.
	pub(crate) fn undo_journal(&mut self) -> Undone {
		let Some(journal) = self.journal.take() else {
			return Undone {
				created: Vec::new(),
				dequeued: Vec::new(),
			};
		};
		let mut created = Vec::new();
		for (id, saved) in journal.instances {
			match saved {
				Some(instance) => {
					self.instances.insert(id, instance);
				}
				None => {
					self.instances.remove(&id);
					created.push(id);
				}
			}
		}
		for (node, saved) in journal.owners {
			match saved {
				Some(owner) => self.owners.insert(node, owner),
				None => self.owners.remove(&node),
			};
		}
		Undone {
			created,
			dequeued: journal.dequeued,
		}
	}

	fn save(&mut self, id: InstanceId) {
		if let Some(journal) = &mut self.journal {
			if !journal.instances.contains_key(&id) {
				journal.instances.insert(id, self.instances.get(&id).cloned());
			}
		}
	}

	fn save_owner(&mut self, node: NodeHandle) {
		if let Some(journal) = &mut self.journal {
			if !journal.owners.contains_key(&node) {
				journal.owners.insert(node, self.owners.get(&node).copied());
			}
		}
	}

	/// Note state updates taken off the shared queue for `id`.
	pub(crate) fn note_dequeued(&mut self, id: InstanceId, updates: &[StateUpdate]) {
		if let Some(journal) = &mut self.journal {
			journal
				.dequeued
				.extend(updates.iter().cloned().map(|update| (id, update)));
		}
	}

	pub(crate) fn insert(&mut self, id: InstanceId, instance: Instance) {
		self.save(id);
		self.instances.insert(id, instance);
	}

	pub(crate) fn get(&self, id: InstanceId) -> Option<&Instance> {
		self.instances.get(&id)
	}

	pub(crate) fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
		if self.instances.contains_key(&id) {
			self.save(id);
		}
		self.instances.get_mut(&id)
	}

	pub(crate) fn remove(&mut self, id: InstanceId) -> Option<Instance> {
		if self.instances.contains_key(&id) {
			self.save(id);
		}
		self.instances.remove(&id)
	}

	pub(crate) fn contains(&self, id: InstanceId) -> bool {
		self.instances.contains_key(&id)
	}

	pub(crate) fn len(&self) -> usize {
		self.instances.len()
	}

	/// The host instance that owns element `node`.
	pub(crate) fn owner(&self, node: NodeHandle) -> Option<InstanceId> {
		self.owners.get(&node).copied()
	}

	pub(crate) fn set_owner(&mut self, node: NodeHandle, id: InstanceId) {
		self.save_owner(node);
		self.owners.insert(node, id);
	}

	pub(crate) fn clear_owner(&mut self, node: NodeHandle) {
		if self.owners.contains_key(&node) {
			self.save_owner(node);
			self.owners.remove(&node);
		}
	}

	/// Number of ancestors above `id`.
	pub(crate) fn depth(&self, id: InstanceId) -> usize {
		let mut depth = 0;
		let mut current = self.get(id).and_then(|instance| instance.parent);
		while let Some(parent) = current {
			depth += 1;
			current = self.get(parent).and_then(|instance| instance.parent);
		}
		depth
	}

	/// Ancestors of `id`, nearest first.
	pub(crate) fn ancestors(&self, id: InstanceId) -> Vec<InstanceId> {
		let mut out = Vec::new();
		let mut current = self.get(id).and_then(|instance| instance.parent);
		while let Some(parent) = current {
			out.push(parent);
			current = self.get(parent).and_then(|instance| instance.parent);
		}
		out
	}

	/// The top-level instance `id` belongs to.
	pub(crate) fn top_of(&self, id: InstanceId) -> InstanceId {
		self.ancestors(id).last().copied().unwrap_or(id)
	}

	/// Replace the child list of `id`, returning the previous one.
	pub(crate) fn take_children(&mut self, id: InstanceId) -> Vec<InstanceId> {
		self.get_mut(id)
			.and_then(Instance::children_mut)
			.map(std::mem::take)
			.unwrap_or_default()
	}

	pub(crate) fn set_children(&mut self, id: InstanceId, children: Vec<InstanceId>) {
		if let Some(slot) = self.get_mut(id).and_then(Instance::children_mut) {
			*slot = children;
		}
	}
}
