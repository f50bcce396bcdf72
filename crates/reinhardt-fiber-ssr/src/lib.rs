//! Server-side rendering for Reinhardt Fiber.
//!
//! Renders a descriptor tree to an HTML string that the client can later
//! hydrate. Suspense boundaries are written as marker-delimited regions
//! (see [`reinhardt_fiber_core::hydration::markers`]); a boundary whose
//! content suspends on the server is written with its fallback under a
//! pending marker so the client knows to render it itself.
//!
//! ## Example
//!
//! ```
//! use reinhardt_fiber_core::{Context, Descriptor, IntoNode};
//! use reinhardt_fiber_ssr::SsrRenderer;
//!
//! let tree = Descriptor::host("ul")
//! 	.child(Descriptor::host("li").child("one"))
//! 	.child(Descriptor::suspense("loading").child(Descriptor::host("li").child("two")));
//!
//! let html = SsrRenderer::new()
//! 	.render_to_string(&tree.into_node(), &Context::new())
//! 	.unwrap();
//! assert_eq!(
//! 	html,
//! 	"<ul><li>one</li><!--rh-start--><li>two</li><!--rh-end--></ul>"
//! );
//! ```

#![warn(missing_docs)]

mod error;
mod renderer;

pub use error::SsrError;
pub use renderer::{SsrOptions, SsrRenderer};
