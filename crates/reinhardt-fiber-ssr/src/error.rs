//! Server rendering errors.

use reinhardt_fiber_core::RenderError;
use thiserror::Error;

/// Failure to produce markup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SsrError {
	/// A component failed and no error boundary recovered.
	#[error(transparent)]
	Render(#[from] RenderError),
	/// A component suspended with no enclosing suspense boundary.
	#[error("component suspended outside of any suspense boundary")]
	SuspendedOutsideBoundary,
	/// A lazy reference names a tag missing from the registry.
	#[error("lazy component `{0}` is not registered")]
	UnknownLazyComponent(String),
}
