//! One-level rendering of a composite component.
//!
//! The component renders once and its output is kept as a descriptor tree;
//! nothing below it is instantiated and no host is involved. Rendering again
//! with the same class updates the existing component object instead of
//! constructing a new one.

use tracing::debug;

use crate::component::{ClassComponent, ComponentRef, DetachedComponent, RenderOutcome, RenderResult, State};
use crate::context::{Context, get_masked_context};
use crate::descriptor::{Descriptor, ElementType, LazyRegistry, Node};
use crate::error::ReconcileError;

/// Renders a single composite component without mounting its children.
#[derive(Debug, Default)]
pub struct ShallowRenderer {
	lazy: LazyRegistry,
	class: Option<(ClassComponent, DetachedComponent)>,
	output: Option<Node>,
}

impl ShallowRenderer {
	/// A renderer with no instance yet.
	pub fn new() -> Self {
		Self::default()
	}

	/// Resolve lazy element types through `registry`.
	pub fn with_lazy_registry(mut self, registry: LazyRegistry) -> Self {
		self.lazy = registry;
		self
	}

	/// Render `descriptor` one level deep and return its output.
	pub fn render(&mut self, descriptor: &Descriptor, context: &Context) -> Result<&Node, ReconcileError> {
		let output = match self.resolve(descriptor.element_type())? {
			ElementType::Function(component) => {
				self.release();
				let masked = get_masked_context(component.context_keys(), context);
				let result = component
					.render(descriptor.props(), &masked)
					.map_err(|error| error.in_component(component.name()));
				output_of(result)?
			}
			ElementType::ForwardRef(component) => {
				self.release();
				let result = component
					.render(descriptor.props(), descriptor.node_ref())
					.map_err(|error| error.in_component(component.name()));
				output_of(result)?
			}
			ElementType::Class(class) => self.render_class(&class, descriptor, context)?,
			other => return Err(ReconcileError::ShallowHostElement(other.display_name())),
		};
		Ok(self.output.insert(output))
	}

	fn render_class(
		&mut self,
		class: &ClassComponent,
		descriptor: &Descriptor,
		context: &Context,
	) -> Result<Node, ReconcileError> {
		let current = self.class.as_mut().filter(|(current, _)| current.ptr_eq(class));
		if let Some((_, component)) = current {
			if !component.receive(descriptor.props(), context) {
				debug!(component = class.name(), "update skipped; keeping previous output");
				return Ok(self.output.clone().unwrap_or_default());
			}
			return output_of(component.render());
		}
		self.release();
		let component = DetachedComponent::construct(class, descriptor.props(), context);
		let output = output_of(component.render())?;
		self.class = Some((class.clone(), component));
		Ok(output)
	}

	fn resolve(&self, element_type: &ElementType) -> Result<ElementType, ReconcileError> {
		self.lazy
			.resolve_type(element_type)
			.map_err(ReconcileError::UnknownLazyComponent)
	}

	/// Apply state updates the class component queued. Returns whether it
	/// rendered again.
	pub fn flush(&mut self) -> Result<bool, ReconcileError> {
		let Some((_, component)) = &mut self.class else {
			return Ok(false);
		};
		if !component.flush() {
			return Ok(false);
		}
		let output = output_of(component.render())?;
		self.output = Some(output);
		Ok(true)
	}

	/// Output of the last render.
	pub fn output(&self) -> Option<&Node> {
		self.output.as_ref()
	}

	/// The class component object, when a class was rendered.
	pub fn instance(&self) -> Option<&ComponentRef> {
		self.class.as_ref().map(|(_, component)| component.handle())
	}

	/// State of the rendered class component.
	pub fn state(&self) -> Option<&State> {
		self.class.as_ref().map(|(_, component)| component.state())
	}

	/// Unmount the rendered component and forget the output.
	pub fn unmount(&mut self) {
		self.release();
		self.output = None;
	}

	fn release(&mut self) {
		if let Some((_, component)) = self.class.take() {
			component.unmount();
		}
	}
}

fn output_of(result: RenderResult) -> Result<Node, ReconcileError> {
	match result? {
		RenderOutcome::Rendered(node) => Ok(node),
		RenderOutcome::Suspended(_) => Err(ReconcileError::SuspendedOutsideBoundary),
	}
}
