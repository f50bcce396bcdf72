//! Suspension signals and resume tokens.
//!
//! A component that cannot produce output yet returns
//! [`crate::RenderOutcome::Suspended`] carrying a [`Suspension`]. The engine
//! never blocks on it; it subscribes to the token and reconciles the
//! affected boundary again once someone calls [`ResumeToken::resolve`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

type Listener = Box<dyn FnOnce()>;

struct TokenState {
	id: u64,
	resolved: bool,
	listeners: Vec<Listener>,
}

/// A single-threaded, resolve-once notification handle.
///
/// Listeners registered before resolution run (once) on [`ResumeToken::resolve`];
/// listeners registered afterwards run immediately.
#[derive(Clone)]
pub struct ResumeToken(Rc<RefCell<TokenState>>);

impl ResumeToken {
	/// A fresh unresolved token.
	pub fn new() -> Self {
		Self(Rc::new(RefCell::new(TokenState {
			id: TOKEN_COUNTER.fetch_add(1, Ordering::SeqCst),
			resolved: false,
			listeners: Vec::new(),
		})))
	}

	/// Process-unique id, for logging.
	pub fn id(&self) -> u64 {
		self.0.borrow().id
	}

	/// Whether [`ResumeToken::resolve`] was called.
	pub fn is_resolved(&self) -> bool {
		self.0.borrow().resolved
	}

	/// Mark the dependency as available and notify listeners.
	///
	/// Resolving twice is a no-op.
	pub fn resolve(&self) {
		let listeners = {
			let mut state = self.0.borrow_mut();
			if state.resolved {
				return;
			}
			state.resolved = true;
			std::mem::take(&mut state.listeners)
		};
		tracing::trace!(token = self.id(), listeners = listeners.len(), "resume token resolved");
		for listener in listeners {
			listener();
		}
	}

	/// Run `listener` once the token resolves.
	pub fn on_resolve(&self, listener: impl FnOnce() + 'static) {
		let resolved = self.is_resolved();
		if resolved {
			listener();
		} else {
			self.0.borrow_mut().listeners.push(Box::new(listener));
		}
	}
}

impl Default for ResumeToken {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for ResumeToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.0.borrow();
		f.debug_struct("ResumeToken")
			.field("id", &state.id)
			.field("resolved", &state.resolved)
			.finish()
	}
}

/// The control-flow signal "retry me once this token resolves".
#[derive(Debug, Clone)]
pub struct Suspension {
	token: ResumeToken,
}

impl Suspension {
	/// Suspend on `token`.
	pub fn new(token: ResumeToken) -> Self {
		Self { token }
	}

	/// The token whose resolution makes a retry worthwhile.
	pub fn token(&self) -> &ResumeToken {
		&self.token
	}
}
