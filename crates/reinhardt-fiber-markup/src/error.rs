//! Markup loading errors.

use reinhardt_fiber_core::NodeHandle;
use thiserror::Error;

/// Failure to load markup into a host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
	/// The target container does not exist in the host.
	#[error("container {0} does not exist")]
	MissingContainer(NodeHandle),
	/// The parser reported errors and strict loading was requested.
	#[error("malformed markup: {}", .0.join("; "))]
	Malformed(Vec<String>),
}
