//! Markup loading module.
//!
//! # Examples
//!
//! ```rust,no_run
//! use reinhardt_fiber::markup::{MarkupError, parse_into};
//! ```

#[cfg(feature = "markup")]
pub use reinhardt_fiber_markup::*;
