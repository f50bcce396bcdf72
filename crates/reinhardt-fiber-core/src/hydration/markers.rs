//! Boundary markers embedded in server-rendered markup.
//!
//! Every suspense boundary is written as a region delimited by comments:
//!
//! ```text
//! <!--rh-start-->content<!--rh-end-->      content was rendered
//! <!--rh-start?-->fallback<!--rh-end-->    content suspended on the server
//! <!--rh-start!-->...<!--rh-end-->         the client has to render it
//! ```
//!
//! Regions nest; the end of a region is found by counting depth, so the
//! interior never needs to be understood to excise it. Adjacent text nodes
//! are separated by `<!--rh-sep-->` so that parsing keeps them apart.

/// Start of a region whose content was rendered.
pub const BOUNDARY_START: &str = "rh-start";

/// Start of a region holding fallback because content suspended.
pub const BOUNDARY_START_PENDING: &str = "rh-start?";

/// Start of a region the client must render from scratch.
pub const BOUNDARY_START_CLIENT: &str = "rh-start!";

/// End of any region.
pub const BOUNDARY_END: &str = "rh-end";

/// Separator between adjacent text nodes.
pub const TEXT_SEPARATOR: &str = "rh-sep";

/// What a marker comment means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
	/// Region with rendered content.
	Start,
	/// Region with fallback content.
	StartPending,
	/// Region to client-render.
	StartClientRender,
	/// End of a region.
	End,
}

impl Marker {
	/// The comment data for this marker.
	pub fn data(self) -> &'static str {
		match self {
			Marker::Start => BOUNDARY_START,
			Marker::StartPending => BOUNDARY_START_PENDING,
			Marker::StartClientRender => BOUNDARY_START_CLIENT,
			Marker::End => BOUNDARY_END,
		}
	}

	/// Whether this marker opens a region.
	pub fn is_start(self) -> bool {
		!matches!(self, Marker::End)
	}

	/// The full `<!--...-->` comment.
	pub fn to_comment(self) -> String {
		format!("<!--{}-->", self.data())
	}
}

/// Recognize a marker from comment data.
pub fn parse_marker(data: &str) -> Option<Marker> {
	match data {
		BOUNDARY_START => Some(Marker::Start),
		BOUNDARY_START_PENDING => Some(Marker::StartPending),
		BOUNDARY_START_CLIENT => Some(Marker::StartClientRender),
		BOUNDARY_END => Some(Marker::End),
		_ => None,
	}
}
