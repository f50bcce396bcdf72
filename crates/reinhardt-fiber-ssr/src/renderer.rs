//! String renderer for descriptor trees.

use reinhardt_fiber_core::host::html;
use reinhardt_fiber_core::host::host_attributes;
use reinhardt_fiber_core::hydration::markers::{Marker, TEXT_SEPARATOR};
use reinhardt_fiber_core::{
	Context, Descriptor, DetachedComponent, ElementType, LazyRegistry, Node, RenderError, RenderOutcome,
	RenderResult, Suspension, get_masked_context,
};
use tracing::{debug, debug_span, trace, warn};

use crate::error::SsrError;

/// Options for server rendering.
#[derive(Debug, Clone)]
pub struct SsrOptions {
	/// Whether to wrap suspense boundaries in marker comments.
	///
	/// Without markers the output cannot be hydrated region by region; it is
	/// only suitable for static pages.
	pub include_boundary_markers: bool,
	/// Whether to separate adjacent text nodes with a comment so that
	/// parsing keeps them apart.
	pub separate_text_nodes: bool,
}

impl Default for SsrOptions {
	fn default() -> Self {
		Self {
			include_boundary_markers: true,
			separate_text_nodes: true,
		}
	}
}

impl SsrOptions {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Disables boundary markers and text separators, producing plain HTML.
	pub fn no_hydration(mut self) -> Self {
		self.include_boundary_markers = false;
		self.separate_text_nodes = false;
		self
	}

	/// Sets whether boundary markers are written.
	pub fn boundary_markers(mut self, enable: bool) -> Self {
		self.include_boundary_markers = enable;
		self
	}

	/// Sets whether adjacent text nodes are separated.
	pub fn text_separators(mut self, enable: bool) -> Self {
		self.separate_text_nodes = enable;
		self
	}
}

/// Why rendering a subtree stopped.
enum Halt {
	Suspended(Suspension),
	Failed(SsrError),
}

impl From<SsrError> for Halt {
	fn from(error: SsrError) -> Self {
		Halt::Failed(error)
	}
}

impl From<RenderError> for Halt {
	fn from(error: RenderError) -> Self {
		Halt::Failed(SsrError::Render(error))
	}
}

/// Output buffer that knows whether the last thing written was text.
#[derive(Default)]
struct Output {
	html: String,
	after_text: bool,
}

/// The server renderer.
///
/// Composites run their render step once. Class components are constructed
/// and run `initial_state` and `will_mount`, but never `did_mount`; nothing
/// rendered on the server stays alive afterwards.
#[derive(Debug, Default)]
pub struct SsrRenderer {
	options: SsrOptions,
	lazy: LazyRegistry,
}

impl SsrRenderer {
	/// Creates a renderer with default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a renderer with custom options.
	pub fn with_options(options: SsrOptions) -> Self {
		Self {
			options,
			lazy: LazyRegistry::default(),
		}
	}

	/// Use `registry` to resolve lazy element types.
	pub fn with_lazy_registry(mut self, registry: LazyRegistry) -> Self {
		self.lazy = registry;
		self
	}

	/// Returns the options.
	pub fn options(&self) -> &SsrOptions {
		&self.options
	}

	/// Render `node` under `context` to an HTML string.
	pub fn render_to_string(&self, node: &Node, context: &Context) -> Result<String, SsrError> {
		let _span = debug_span!("render_to_string").entered();
		let mut out = Output::default();
		match self.render_node(node, context, &mut out) {
			Ok(()) => {
				debug!(bytes = out.html.len(), "rendered");
				Ok(out.html)
			}
			Err(Halt::Suspended(suspension)) => {
				debug!(token = suspension.token().id(), "suspended outside of any boundary");
				Err(SsrError::SuspendedOutsideBoundary)
			}
			Err(Halt::Failed(error)) => Err(error),
		}
	}

	fn render_node(&self, node: &Node, context: &Context, out: &mut Output) -> Result<(), Halt> {
		match node {
			Node::Empty => Ok(()),
			Node::Text(text) => {
				self.write_text(text, out);
				Ok(())
			}
			Node::Fragment(children) => self.render_children(children, context, out),
			Node::Element(descriptor) => self.render_element(descriptor, context, out),
		}
	}

	fn render_children(&self, children: &[Node], context: &Context, out: &mut Output) -> Result<(), Halt> {
		for child in children {
			self.render_node(child, context, out)?;
		}
		Ok(())
	}

	fn render_element(&self, descriptor: &Descriptor, context: &Context, out: &mut Output) -> Result<(), Halt> {
		let props = descriptor.props();
		match self.resolve(descriptor.element_type())? {
			ElementType::Host(tag) => {
				html::write_open_tag(&mut out.html, &tag, &host_attributes(props));
				out.after_text = false;
				if html::is_void_element(&tag) {
					if !props.children().is_empty() {
						warn!(tag = %tag, "children of a void element are not rendered");
					}
				} else {
					self.render_children(props.children(), context, out)?;
					html::write_close_tag(&mut out.html, &tag);
				}
				out.after_text = false;
				Ok(())
			}
			ElementType::Function(component) => {
				let masked = get_masked_context(component.context_keys(), context);
				let outcome = rendered(component.render(props, &masked), component.name())?;
				self.render_node(&outcome, context, out)
			}
			ElementType::ForwardRef(component) => {
				// Refs have nothing to point at on the server.
				let outcome = rendered(component.render(props, None), component.name())?;
				self.render_node(&outcome, context, out)
			}
			ElementType::Class(class) => {
				let mut detached = DetachedComponent::construct(&class, props, context);
				let outcome = rendered(detached.render(), class.name())?;
				let child_context = detached.child_context(context);
				let mut buffer = Output {
					html: String::new(),
					after_text: out.after_text,
				};
				match self.render_node(&outcome, &child_context, &mut buffer) {
					Err(Halt::Failed(SsrError::Render(error))) if detached.handle().borrow().is_error_boundary() => {
						warn!(component = class.name(), %error, "render error caught by error boundary");
						detached.handle().borrow_mut().did_catch(&error);
						detached.flush();
						let outcome = rendered(detached.render(), class.name())?;
						let child_context = detached.child_context(context);
						self.render_node(&outcome, &child_context, out)
					}
					Ok(()) => {
						out.html.push_str(&buffer.html);
						out.after_text = buffer.after_text;
						Ok(())
					}
					Err(halt) => Err(halt),
				}
			}
			ElementType::Suspense => self.render_boundary(descriptor, context, out),
			ElementType::Lazy(tag) => Err(SsrError::UnknownLazyComponent(tag).into()),
		}
	}

	/// Write a boundary region: its content when it renders, otherwise its
	/// fallback under a pending marker.
	fn render_boundary(&self, descriptor: &Descriptor, context: &Context, out: &mut Output) -> Result<(), Halt> {
		let markers = self.options.include_boundary_markers;
		let mut content = Output {
			html: String::new(),
			after_text: !markers && out.after_text,
		};
		let (start, body) = match self.render_children(descriptor.props().children(), context, &mut content) {
			Ok(()) => (Marker::Start, content),
			Err(Halt::Suspended(suspension)) => {
				trace!(token = suspension.token().id(), "boundary content suspended; writing fallback");
				let mut fallback = Output {
					html: String::new(),
					after_text: !markers && out.after_text,
				};
				self.render_node(descriptor.fallback_node(), context, &mut fallback)?;
				(Marker::StartPending, fallback)
			}
			Err(halt) => return Err(halt),
		};
		if markers {
			out.html.push_str(&start.to_comment());
			out.html.push_str(&body.html);
			out.html.push_str(&Marker::End.to_comment());
			out.after_text = false;
		} else {
			out.html.push_str(&body.html);
			if !body.html.is_empty() {
				out.after_text = body.after_text;
			}
		}
		Ok(())
	}

	fn write_text(&self, text: &str, out: &mut Output) {
		// Empty text has no markup; hydration creates it fresh.
		if text.is_empty() {
			return;
		}
		if out.after_text && self.options.separate_text_nodes {
			html::write_comment(&mut out.html, TEXT_SEPARATOR);
		}
		out.html.push_str(&html::escape_text(text));
		out.after_text = true;
	}

	/// Follow lazy registrations to a concrete element type.
	fn resolve(&self, element_type: &ElementType) -> Result<ElementType, SsrError> {
		self.lazy
			.resolve_type(element_type)
			.map_err(SsrError::UnknownLazyComponent)
	}}

fn rendered(result: RenderResult, name: &str) -> Result<Node, Halt> {
	match result {
		Ok(RenderOutcome::Rendered(node)) => Ok(node),
		Ok(RenderOutcome::Suspended(suspension)) => Err(Halt::Suspended(suspension)),
		Err(error) => Err(error.in_component(name).into()),
	}
}
