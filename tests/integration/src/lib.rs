//! Integration test utilities for Reinhardt Fiber
//!
//! Shared fixtures for scenarios that span server rendering, markup loading
//! and client hydration.

use std::cell::RefCell;
use std::rc::Rc;

use reinhardt_fiber::markup::parse_into;
use reinhardt_fiber::ssr::SsrRenderer;
use reinhardt_fiber::{
	Context, Descriptor, FunctionComponent, IntoNode, MemoryHost, Mutation, NodeHandle, Props, PublicInstance,
	RefTarget, RenderOutcome, ResumeToken,
};

/// A dependency that components can wait on.
///
/// Components built through [`Gate::component`] suspend until the gate is
/// opened.
#[derive(Debug, Clone, Default)]
pub struct Gate {
	token: ResumeToken,
}

impl Gate {
	/// A closed gate.
	pub fn new() -> Self {
		Self::default()
	}

	/// An already opened gate, as seen by a server that has the data.
	pub fn opened() -> Self {
		let gate = Self::new();
		gate.open();
		gate
	}

	/// Resolve the underlying token.
	pub fn open(&self) {
		self.token.resolve();
	}

	/// Whether the gate was opened.
	pub fn is_open(&self) -> bool {
		self.token.is_resolved()
	}

	/// A function component that suspends while the gate is closed and
	/// otherwise renders `render(props)`.
	pub fn component<F, N>(&self, name: &str, render: F) -> FunctionComponent
	where
		F: Fn(&Props) -> N + 'static,
		N: IntoNode,
	{
		let token = self.token.clone();
		FunctionComponent::new(name, move |props, _| {
			if token.is_resolved() {
				Ok(RenderOutcome::rendered(render(props)))
			} else {
				Ok(RenderOutcome::suspended(&token))
			}
		})
	}
}

/// What a logged ref received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefEvent {
	/// Attached to a host node.
	Node(NodeHandle),
	/// Attached to a component.
	Component(String),
	/// Detached.
	Detached,
}

/// A callback ref that records every call.
#[derive(Clone)]
pub struct RefLog {
	events: Rc<RefCell<Vec<RefEvent>>>,
	target: RefTarget,
}

impl RefLog {
	/// A fresh log with its own target.
	pub fn new() -> Self {
		let events: Rc<RefCell<Vec<RefEvent>>> = Rc::default();
		let sink = events.clone();
		let target = RefTarget::callback(move |value| {
			sink.borrow_mut().push(match value {
				Some(PublicInstance::Host(node)) => RefEvent::Node(node),
				Some(PublicInstance::Component(component)) => RefEvent::Component(component.name().to_string()),
				None => RefEvent::Detached,
			});
		});
		Self { events, target }
	}

	/// The ref target to put on a descriptor.
	pub fn target(&self) -> RefTarget {
		self.target.clone()
	}

	/// Everything recorded so far.
	pub fn events(&self) -> Vec<RefEvent> {
		self.events.borrow().clone()
	}

	/// The node the ref currently points at, if any.
	pub fn current_node(&self) -> Option<NodeHandle> {
		match self.events.borrow().last() {
			Some(RefEvent::Node(node)) => Some(*node),
			_ => None,
		}
	}
}

impl Default for RefLog {
	fn default() -> Self {
		Self::new()
	}
}

/// Render `descriptor` to markup the way a server would.
pub fn render_markup(descriptor: &Descriptor, context: &Context) -> String {
	SsrRenderer::new()
		.render_to_string(&descriptor.clone().into_node(), context)
		.unwrap_or_else(|error| panic!("server render failed: {error}"))
}

/// A fresh host with `html` loaded into a new container.
///
/// The mutation log is cleared so that only client work shows up in it.
pub fn load_container(html: &str) -> (MemoryHost, NodeHandle) {
	let mut host = MemoryHost::new();
	let container = host.create_container();
	parse_into(&mut host, container, html).unwrap_or_else(|error| panic!("markup did not load: {error}"));
	host.clear_mutations();
	(host, container)
}

/// Number of nodes created since the log was last cleared.
pub fn created_nodes(host: &MemoryHost) -> usize {
	host.mutations()
		.iter()
		.filter(|mutation| matches!(mutation, Mutation::CreateElement { .. } | Mutation::CreateText { .. }))
		.count()
}

/// `html` without any comments.
pub fn strip_comments(html: &str) -> String {
	let mut out = String::with_capacity(html.len());
	let mut rest = html;
	while let Some(start) = rest.find("<!--") {
		out.push_str(&rest[..start]);
		match rest[start..].find("-->") {
			Some(end) => rest = &rest[start + end + 3..],
			None => {
				rest = "";
				break;
			}
		}
	}
	out.push_str(rest);
	out
}
