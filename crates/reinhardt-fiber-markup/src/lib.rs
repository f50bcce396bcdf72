//! Markup loading for Reinhardt Fiber.
//!
//! Parses an HTML fragment (typically produced by `reinhardt-fiber-ssr`)
//! into a [`MemoryHost`] so a reconciler can hydrate against it. Comments
//! are kept, since suspense boundary markers and text separators are
//! comments.
//!
//! ```
//! use reinhardt_fiber_core::MemoryHost;
//! use reinhardt_fiber_markup::parse_into;
//!
//! let mut host = MemoryHost::new();
//! let container = host.create_container();
//! let nodes = parse_into(&mut host, container, "<p>a<!--rh-sep-->b</p>").unwrap();
//!
//! assert_eq!(nodes.len(), 1);
//! assert_eq!(host.inner_html(container), "<p>a<!--rh-sep-->b</p>");
//! ```

#![warn(missing_docs)]

mod error;
mod parser;

pub use error::MarkupError;
pub use parser::{parse_into, parse_into_strict};
