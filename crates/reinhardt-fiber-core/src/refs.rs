//! Ref targets and the attach/detach schedule.
//!
//! A ref target is caller-owned. The reconciler invokes it exactly once per
//! attach and exactly once per detach; attaching is deferred until the pass
//! that mounted the instance commits, detaching happens as soon as the
//! instance stops being the target's owner.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::component::ComponentRef;
use crate::descriptor::Descriptor;
use crate::host::NodeHandle;

/// The handle a ref receives.
#[derive(Debug, Clone)]
pub enum PublicInstance {
	/// The host node of a host element.
	Host(NodeHandle),
	/// The component object of a class component.
	Component(ComponentRef),
}

impl PublicInstance {
	/// The host node, if this is one.
	pub fn as_node(&self) -> Option<NodeHandle> {
		match self {
			PublicInstance::Host(node) => Some(*node),
			PublicInstance::Component(_) => None,
		}
	}

	/// The component object, if this is one.
	pub fn as_component(&self) -> Option<&ComponentRef> {
		match self {
			PublicInstance::Component(component) => Some(component),
			PublicInstance::Host(_) => None,
		}
	}
}

impl PartialEq for PublicInstance {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(PublicInstance::Host(a), PublicInstance::Host(b)) => a == b,
			(PublicInstance::Component(a), PublicInstance::Component(b)) => {
				ComponentRef::ptr_eq(a, b)
			}
			_ => false,
		}
	}
}

/// A single-slot cell assigned the public instance.
#[derive(Clone, Default)]
pub struct RefSlot(Rc<RefCell<Option<PublicInstance>>>);

impl RefSlot {
	/// An empty slot.
	pub fn new() -> Self {
		Self::default()
	}

	/// Current content.
	pub fn get(&self) -> Option<PublicInstance> {
		self.0.borrow().clone()
	}

	/// Current host node, if the slot holds one.
	pub fn node(&self) -> Option<NodeHandle> {
		self.0.borrow().as_ref().and_then(PublicInstance::as_node)
	}

	/// Whether nothing is attached.
	pub fn is_empty(&self) -> bool {
		self.0.borrow().is_none()
	}

	fn set(&self, value: Option<PublicInstance>) {
		*self.0.borrow_mut() = value;
	}
}

impl fmt::Debug for RefSlot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("RefSlot").field(&*self.0.borrow()).finish()
	}
}

type RefCallback = dyn Fn(Option<PublicInstance>);

/// Where a descriptor's public instance is delivered.
#[derive(Clone)]
pub enum RefTarget {
	/// Assign into a slot.
	Slot(RefSlot),
	/// Call back with the instance on attach and `None` on detach.
	Callback(Rc<RefCallback>),
}

impl RefTarget {
	/// A callback target.
	pub fn callback(f: impl Fn(Option<PublicInstance>) + 'static) -> Self {
		RefTarget::Callback(Rc::new(f))
	}

	/// Identity comparison; two targets are "the same ref" only if they share
	/// the underlying slot or callback.
	pub fn ptr_eq(a: &RefTarget, b: &RefTarget) -> bool {
		match (a, b) {
			(RefTarget::Slot(a), RefTarget::Slot(b)) => Rc::ptr_eq(&a.0, &b.0),
			(RefTarget::Callback(a), RefTarget::Callback(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}

	pub(crate) fn deliver(&self, value: Option<PublicInstance>) {
		match self {
			RefTarget::Slot(slot) => slot.set(value),
			RefTarget::Callback(callback) => callback(value),
		}
	}
}

impl From<RefSlot> for RefTarget {
	fn from(slot: RefSlot) -> Self {
		RefTarget::Slot(slot)
	}
}

impl fmt::Debug for RefTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RefTarget::Slot(slot) => slot.fmt(f),
			RefTarget::Callback(_) => f.write_str("RefTarget::Callback"),
		}
	}
}

/// Whether moving from `prev` to `next` must detach the old ref and attach
/// the new one.
///
/// True when the ref identity differs or the element type changed.
pub fn should_update_refs(prev: &Descriptor, next: &Descriptor) -> bool {
	if !prev.element_type().same_type(next.element_type()) {
		return true;
	}
	match (prev.node_ref(), next.node_ref()) {
		(Some(a), Some(b)) => !RefTarget::ptr_eq(a, b),
		(None, None) => false,
		_ => true,
	}
}
