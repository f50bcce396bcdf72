//! Error types for reconciliation, hydration and configuration.

use thiserror::Error;

use crate::instance::InstanceId;

/// A genuine fault raised by a component's render step.
///
/// Suspension is not an error and never travels through this type; see
/// [`crate::RenderOutcome::Suspended`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", failed_render(.component))]
pub struct RenderError {
	message: String,
	component: Option<String>,
}

impl RenderError {
	/// Creates a render error with the given message.
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			component: None,
		}
	}

	/// Records the name of the component that failed, unless one is already recorded.
	pub fn in_component(mut self, name: &str) -> Self {
		if self.component.is_none() {
			self.component = Some(name.to_string());
		}
		self
	}

	/// The failure message.
	pub fn message(&self) -> &str {
		&self.message
	}

	/// The name of the component whose render failed, if known.
	pub fn component(&self) -> Option<&str> {
		self.component.as_deref()
	}
}

fn failed_render(component: &Option<String>) -> String {
	match component {
		Some(name) => format!("render of `{name}` failed"),
		None => "render failed".to_string(),
	}
}

/// Failure while matching existing markup against a descriptor tree.
///
/// These are recovered locally by discarding the markup region and client
/// rendering, so they mostly surface through logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydrationError {
	/// The next existing node has the wrong shape.
	#[error("hydration mismatch: expected {expected}, found {found}")]
	StructureMismatch {
		/// What the descriptor tree asked for.
		expected: String,
		/// What the markup contained.
		found: String,
	},
	/// The markup ran out of nodes.
	#[error("hydration mismatch: expected {expected}, found no node")]
	MissingNode {
		/// What the descriptor tree asked for.
		expected: String,
	},
	/// A boundary start marker has no matching end marker.
	#[error("suspense boundary marker is never closed")]
	UnterminatedBoundary,
}

/// Unrecovered failure of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
	/// A render failure no error boundary caught.
	#[error(transparent)]
	Render(#[from] RenderError),
	/// The instance was already unmounted, or never existed.
	#[error("instance {0} is not mounted")]
	NotMounted(InstanceId),
	/// A lazy reference names a tag missing from the registry.
	#[error("lazy component `{0}` is not registered")]
	UnknownLazyComponent(String),
	/// A root update was handed a descriptor of a different type or key.
	#[error("cannot update instance {id} with an incompatible descriptor `{found}`")]
	IncompatibleDescriptor {
		/// Instance being updated.
		id: InstanceId,
		/// Display name of the rejected descriptor's type.
		found: String,
	},
	/// State updates kept scheduling more state updates.
	#[error("maximum update depth of {0} exceeded")]
	UpdateDepthExceeded(usize),
	/// A component suspended with no enclosing suspense boundary to catch it.
	#[error("component suspended outside of any suspense boundary")]
	SuspendedOutsideBoundary,
	/// Shallow rendering only supports composite components.
	#[error("shallow rendering requires a composite component, got `{0}`")]
	ShallowHostElement(String),
	/// Hydration failed in a way that client rendering could not recover.
	#[error(transparent)]
	Hydration(#[from] HydrationError),
}

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The TOML document could not be parsed.
	#[error("invalid reconciler configuration: {0}")]
	Toml(#[from] toml::de::Error),
	/// A value is outside its allowed range.
	#[error("invalid value for `{field}`: {reason}")]
	InvalidValue {
		/// Offending field.
		field: &'static str,
		/// Why it was rejected.
		reason: String,
	},
}
