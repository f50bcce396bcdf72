//! Server-side rendering module.
//!
//! # Examples
//!
//! ```rust,no_run
//! use reinhardt_fiber::ssr::{SsrOptions, SsrRenderer};
//! ```

#[cfg(feature = "ssr")]
pub use reinhardt_fiber_ssr::*;
