//! Immutable descriptions of what should be rendered.
//!
//! A [`Descriptor`] is a cheap, reference-counted value. Cloning it shares the
//! same allocation, which is what makes the reconciler's reference-equality
//! bail-out possible: a parent that passes the very same child descriptor
//! down again lets the child skip its update entirely.
//!
//! ```
//! use reinhardt_fiber_core::{Descriptor, Node};
//!
//! let list = Descriptor::host("ul")
//! 	.child(Descriptor::host("li").key("a").child("first"))
//! 	.child(Descriptor::host("li").key("b").child("second"));
//! assert_eq!(list.props().children().len(), 2);
//! assert!(matches!(&list.props().children()[0], Node::Element(_)));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::component::{ClassComponent, ForwardRef, FunctionComponent};
use crate::refs::RefTarget;

/// Sibling-scoped identity of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
	/// The key as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Key {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<String> for Key {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl From<usize> for Key {
	fn from(value: usize) -> Self {
		Self(value.to_string())
	}
}

/// The kind of thing a descriptor renders.
///
/// Matching is always exhaustive over this closed set; there is no runtime
/// inspection of component shape.
#[derive(Clone)]
pub enum ElementType {
	/// A host primitive, e.g. `div`.
	Host(String),
	/// A stateless function component.
	Function(FunctionComponent),
	/// A stateful class component.
	Class(ClassComponent),
	/// A function component that receives the descriptor's ref.
	ForwardRef(ForwardRef),
	/// A reference resolved through the reconciler's [`LazyRegistry`].
	Lazy(String),
	/// A suspense boundary; content lives in `props.children`, fallback in
	/// [`Descriptor::fallback_node`].
	Suspense,
}

impl ElementType {
	/// Whether two types are the same for reconciliation purposes.
	///
	/// Host and lazy types compare by tag, components by identity of their
	/// definition, suspense boundaries are all alike.
	pub fn same_type(&self, other: &ElementType) -> bool {
		match (self, other) {
			(Self::Host(a), Self::Host(b)) => a == b,
			(Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
			(Self::Class(a), Self::Class(b)) => a.ptr_eq(b),
			(Self::ForwardRef(a), Self::ForwardRef(b)) => a.ptr_eq(b),
			(Self::Lazy(a), Self::Lazy(b)) => a == b,
			(Self::Suspense, Self::Suspense) => true,
			_ => false,
		}
	}

	/// Human readable name used in logs and errors.
	pub fn display_name(&self) -> String {
		match self {
			Self::Host(tag) => tag.clone(),
			Self::Function(component) => component.name().to_string(),
			Self::Class(component) => component.name().to_string(),
			Self::ForwardRef(component) => component.name().to_string(),
			Self::Lazy(tag) => format!("lazy({tag})"),
			Self::Suspense => "Suspense".to_string(),
		}
	}
}

impl fmt::Debug for ElementType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Host(tag) => f.debug_tuple("Host").field(tag).finish(),
			Self::Function(component) => f.debug_tuple("Function").field(&component.name()).finish(),
			Self::Class(component) => f.debug_tuple("Class").field(&component.name()).finish(),
			Self::ForwardRef(component) => {
				f.debug_tuple("ForwardRef").field(&component.name()).finish()
			}
			Self::Lazy(tag) => f.debug_tuple("Lazy").field(tag).finish(),
			Self::Suspense => f.write_str("Suspense"),
		}
	}
}

impl From<FunctionComponent> for ElementType {
	fn from(component: FunctionComponent) -> Self {
		Self::Function(component)
	}
}

impl From<ClassComponent> for ElementType {
	fn from(component: ClassComponent) -> Self {
		Self::Class(component)
	}
}

impl From<ForwardRef> for ElementType {
	fn from(component: ForwardRef) -> Self {
		Self::ForwardRef(component)
	}
}

/// Ordered props of a descriptor. Opaque to the engine except for host
/// elements, where values become attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
	values: IndexMap<String, Value>,
	children: Vec<Node>,
}

impl Props {
	/// Empty props.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder form of [`Props::insert`].
	pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.insert(name, value);
		self
	}

	/// Set a prop, keeping its original position if it already exists.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
		self.values.insert(name.into(), value.into());
	}

	/// Look up a prop.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.values.get(name)
	}

	/// Look up a string prop.
	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.values.get(name).and_then(Value::as_str)
	}

	/// All prop values in insertion order.
	pub fn values(&self) -> &IndexMap<String, Value> {
		&self.values
	}

	/// Declared children.
	pub fn children(&self) -> &[Node] {
		&self.children
	}

	/// Append a child.
	pub fn push_child(&mut self, child: impl IntoNode) {
		self.children.push(child.into_node());
	}
}

#[derive(Clone)]
struct DescriptorData {
	element_type: ElementType,
	key: Option<Key>,
	props: Props,
	node_ref: Option<RefTarget>,
	fallback: Node,
}

/// An immutable description of an element: type, key, props and optional ref.
///
/// Two descriptors are reconciliation-compatible when their types are the
/// same and their keys are equal.
#[derive(Clone)]
pub struct Descriptor(Rc<DescriptorData>);

impl Descriptor {
	/// A descriptor of the given type with empty props.
	pub fn new(element_type: impl Into<ElementType>) -> Self {
		Self(Rc::new(DescriptorData {
			element_type: element_type.into(),
			key: None,
			props: Props::default(),
			node_ref: None,
			fallback: Node::Empty,
		}))
	}

	/// A host primitive such as `div`.
	pub fn host(tag: impl Into<String>) -> Self {
		Self::new(ElementType::Host(tag.into()))
	}

	/// A reference to a component registered in a [`LazyRegistry`].
	pub fn lazy(tag: impl Into<String>) -> Self {
		Self::new(ElementType::Lazy(tag.into()))
	}

	/// A suspense boundary showing `fallback` while its content is suspended.
	pub fn suspense(fallback: impl IntoNode) -> Self {
		Self::new(ElementType::Suspense).fallback(fallback)
	}

	fn data_mut(&mut self) -> &mut DescriptorData {
		Rc::make_mut(&mut self.0)
	}

	/// Set the sibling key.
	pub fn key(mut self, key: impl Into<Key>) -> Self {
		self.data_mut().key = Some(key.into());
		self
	}

	/// Set a prop. For host elements props become attributes.
	pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.data_mut().props.insert(name, value);
		self
	}

	/// Alias of [`Descriptor::prop`] that reads better on host elements.
	pub fn attr(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.prop(name, value)
	}

	/// Replace all props (children included).
	pub fn props_from(mut self, props: Props) -> Self {
		self.data_mut().props = props;
		self
	}

	/// Append a child.
	pub fn child(mut self, child: impl IntoNode) -> Self {
		self.data_mut().props.push_child(child);
		self
	}

	/// Append several children.
	pub fn children<I, C>(mut self, children: I) -> Self
	where
		I: IntoIterator<Item = C>,
		C: IntoNode,
	{
		let data = self.data_mut();
		for child in children {
			data.props.push_child(child);
		}
		self
	}

	/// Attach a ref target.
	pub fn with_ref(mut self, target: RefTarget) -> Self {
		self.data_mut().node_ref = Some(target);
		self
	}

	/// Set the fallback shown while a suspense boundary's content is suspended.
	pub fn fallback(mut self, fallback: impl IntoNode) -> Self {
		self.data_mut().fallback = fallback.into_node();
		self
	}

	/// The element type.
	pub fn element_type(&self) -> &ElementType {
		&self.0.element_type
	}

	/// The sibling key, if any.
	pub fn key_ref(&self) -> Option<&Key> {
		self.0.key.as_ref()
	}

	/// The props.
	pub fn props(&self) -> &Props {
		&self.0.props
	}

	/// The ref target, if any.
	pub fn node_ref(&self) -> Option<&RefTarget> {
		self.0.node_ref.as_ref()
	}

	/// Suspense fallback content.
	pub fn fallback_node(&self) -> &Node {
		&self.0.fallback
	}

	/// Reference equality of the whole immutable value.
	pub fn ptr_eq(a: &Descriptor, b: &Descriptor) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}

	/// Whether `other` may update an instance created from `self`.
	pub fn is_compatible(&self, other: &Descriptor) -> bool {
		self.element_type().same_type(other.element_type()) && self.key_ref() == other.key_ref()
	}
}

impl PartialEq for Descriptor {
	fn eq(&self, other: &Self) -> bool {
		if Descriptor::ptr_eq(self, other) {
			return true;
		}
		let refs_equal = match (self.node_ref(), other.node_ref()) {
			(Some(a), Some(b)) => RefTarget::ptr_eq(a, b),
			(None, None) => true,
			_ => false,
		};
		self.is_compatible(other)
			&& refs_equal
			&& self.props() == other.props()
			&& self.fallback_node() == other.fallback_node()
	}
}

impl fmt::Debug for Descriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Descriptor")
			.field("type", self.element_type())
			.field("key", &self.key_ref())
			.field("props", self.props())
			.field("has_ref", &self.node_ref().is_some())
			.finish()
	}
}

/// One entry of a child list.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
	/// An element.
	Element(Descriptor),
	/// A text node.
	Text(String),
	/// A nested, unkeyed list of nodes.
	Fragment(Vec<Node>),
	/// Nothing. Still occupies its position in a sibling list.
	#[default]
	Empty,
}

impl Node {
	/// The element descriptor, if this node is one.
	pub fn as_descriptor(&self) -> Option<&Descriptor> {
		match self {
			Node::Element(descriptor) => Some(descriptor),
			_ => None,
		}
	}

	/// Flatten a render result into the sibling list it contributes.
	///
	/// A top-level fragment contributes its items, `Empty` contributes
	/// nothing, anything else is a single child.
	pub fn into_children(self) -> Vec<Node> {
		match self {
			Node::Fragment(children) => children,
			Node::Empty => Vec::new(),
			node => vec![node],
		}
	}
}

/// Conversion into a [`Node`].
///
/// Mirrors how children are written: descriptors, strings, optional
/// children and lists all work.
pub trait IntoNode {
	/// Perform the conversion.
	fn into_node(self) -> Node;
}

impl IntoNode for Node {
	fn into_node(self) -> Node {
		self
	}
}

impl IntoNode for Descriptor {
	fn into_node(self) -> Node {
		Node::Element(self)
	}
}

impl IntoNode for String {
	fn into_node(self) -> Node {
		Node::Text(self)
	}
}

impl IntoNode for &str {
	fn into_node(self) -> Node {
		Node::Text(self.to_string())
	}
}

impl IntoNode for &String {
	fn into_node(self) -> Node {
		Node::Text(self.clone())
	}
}

impl IntoNode for () {
	fn into_node(self) -> Node {
		Node::Empty
	}
}

impl<T: IntoNode> IntoNode for Option<T> {
	fn into_node(self) -> Node {
		self.map_or(Node::Empty, IntoNode::into_node)
	}
}

impl<T: IntoNode> IntoNode for Vec<T> {
	fn into_node(self) -> Node {
		Node::Fragment(self.into_iter().map(IntoNode::into_node).collect())
	}
}

/// Bound on chained lazy registrations.
pub const MAX_LAZY_DEPTH: usize = 16;

/// Maps lazy tags to the element types they stand for.
///
/// The registry is handed to the reconciler (and server renderer) when it
/// is built, so resolution never depends on process-wide registration order.
#[derive(Clone, Default)]
pub struct LazyRegistry {
	entries: HashMap<String, ElementType>,
}

impl LazyRegistry {
	/// An empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder form of [`LazyRegistry::register`].
	pub fn with(mut self, tag: impl Into<String>, element_type: impl Into<ElementType>) -> Self {
		self.register(tag, element_type);
		self
	}

	/// Register (or replace) the type for a tag.
	pub fn register(&mut self, tag: impl Into<String>, element_type: impl Into<ElementType>) {
		self.entries.insert(tag.into(), element_type.into());
	}

	/// Look up a tag.
	pub fn resolve(&self, tag: &str) -> Option<&ElementType> {
		self.entries.get(tag)
	}

	/// Follow lazy registrations from `element_type` to a concrete type.
	///
	/// Non-lazy types come back as they are. On failure the error names the
	/// missing tag, or the starting type when the chain is longer than
	/// [`MAX_LAZY_DEPTH`].
	pub fn resolve_type(&self, element_type: &ElementType) -> Result<ElementType, String> {
		let mut current = element_type.clone();
		for _ in 0..MAX_LAZY_DEPTH {
			match current {
				ElementType::Lazy(tag) => current = self.resolve(&tag).cloned().ok_or(tag)?,
				resolved => return Ok(resolved),
			}
		}
		Err(element_type.display_name())
	}

	/// Number of registered tags.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl fmt::Debug for LazyRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut tags: Vec<&String> = self.entries.keys().collect();
		tags.sort();
		f.debug_struct("LazyRegistry").field("tags", &tags).finish()
	}
}
