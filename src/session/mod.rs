//! C6 — Session Store façade: per-session history, config merge, and
//! an in-memory home for stagnation/iteration tapes.

pub mod state;
pub mod store;

pub use state::SessionState;
pub use store::{SessionStore, SessionStoreError};
