//! Routing
//!
//! Route table, the guard deciding which screen a path shows, and the
//! navigator that keeps the guard in step with the session.

pub mod guard;
pub mod navigator;

pub use guard::{Access, GuardState, Route, RouteDecision, RouteGuard};
pub use navigator::Navigator;
