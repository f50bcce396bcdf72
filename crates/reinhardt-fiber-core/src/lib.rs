//! Reinhardt Fiber - tree reconciliation engine
//!
//! This crate turns a declarative tree of [`Descriptor`]s into a live instance
//! tree backed by a [`HostAdapter`], keeps that tree in sync as descriptors
//! change, and can resume against markup that was produced ahead of time
//! (hydration), including suspense boundaries whose content is not yet
//! available.
//!
//! ## Architecture
//!
//! - **Descriptor**: immutable "what to render" values ([`Descriptor`], [`Node`])
//! - **Reconciler**: mount / update / unmount of the instance tree ([`Reconciler`])
//! - **Refs**: exactly-once attach/detach of caller-owned targets ([`RefTarget`])
//! - **Context**: ambient read-only data threaded down the tree ([`Context`])
//! - **Hydration**: adopting server markup, suspense boundary state machine
//! - **Root**: a driver owning one reconciler and one container ([`Root`])
//!
//! ## Example
//!
//! ```
//! use reinhardt_fiber_core::{Descriptor, MemoryHost, Reconciler, Root};
//!
//! let mut host = MemoryHost::new();
//! let container = host.create_container();
//! let mut root = Root::new(Reconciler::new(host), container);
//!
//! root.render(Descriptor::host("p").attr("class", "greeting").child("Hello"))
//! 	.unwrap();
//! assert_eq!(
//! 	root.host().inner_html(container),
//! 	r#"<p class="greeting">Hello</p>"#
//! );
//! ```

#![warn(missing_docs)]

pub mod component;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod hydration;
pub mod instance;
pub mod reconciler;
pub mod refs;
pub mod root;
pub mod shallow;
pub mod suspense;

pub use component::{
	ClassComponent, Component, ComponentRef, DetachedComponent, ForwardRef, FunctionComponent,
	RenderOutcome, RenderResult, RenderScope, State, Updater,
};
pub use config::ReconcilerConfig;
pub use context::{Context, get_masked_context};
pub use descriptor::{Descriptor, ElementType, IntoNode, Key, LazyRegistry, Node, Props};
pub use error::{ConfigError, HydrationError, ReconcileError, RenderError};
pub use host::{HostAdapter, HostNodeInfo, MemoryHost, Mutation, NodeHandle};
pub use hydration::BoundaryState;
pub use instance::InstanceId;
pub use reconciler::{MountResult, MountStatus, Reconciler, UpdateResult};
pub use refs::{PublicInstance, RefSlot, RefTarget, should_update_refs};
pub use root::Root;
pub use shallow::ShallowRenderer;
pub use suspense::{ResumeToken, Suspension};
