//! # Reinhardt Fiber
//!
//! Tree reconciliation and partial hydration for Reinhardt frontends.
//!
//! The engine turns a declarative tree of descriptors into a live instance
//! tree on top of a host adapter, keeps it in sync as descriptors change,
//! and can resume against markup rendered ahead of time, one suspense
//! boundary at a time.
//!
//! ## Feature Flags
//!
//! - `ssr` - Server-side string rendering with boundary markers
//! - `markup` - Loading serialized markup into an in-memory host
//! - `full` (default) - All of the above
//!
//! ## Quick Example
//!
//! ```rust
//! use reinhardt_fiber::{Context, Descriptor, IntoNode, MemoryHost, Reconciler};
//!
//! let tree = Descriptor::host("p").child("Hello");
//!
//! # #[cfg(feature = "full")]
//! # {
//! // Render on the server...
//! let html = reinhardt_fiber::ssr::SsrRenderer::new()
//! 	.render_to_string(&tree.clone().into_node(), &Context::new())
//! 	.unwrap();
//!
//! // ...and adopt the markup on the client.
//! let mut host = MemoryHost::new();
//! let container = host.create_container();
//! reinhardt_fiber::markup::parse_into(&mut host, container, &html).unwrap();
//! let mut reconciler = Reconciler::new(host);
//! reconciler.hydrate(&tree, container, &Context::new()).unwrap();
//! assert_eq!(reconciler.host().inner_html(container), "<p>Hello</p>");
//! # }
//! ```

#[cfg(feature = "markup")]
pub mod markup;
#[cfg(feature = "ssr")]
pub mod ssr;

pub use reinhardt_fiber_core::*;
