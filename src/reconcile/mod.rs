//! Desired-state reconciliation
//!
//! The [`Reconciler`] owns the convergence logic, [`Event`] is how the host
//! integration drives it.

pub mod event;
pub mod outcome;
pub mod reconciler;

pub use event::{publish, Event};
pub use outcome::ReconcileOutcome;
pub use reconciler::{Reconciler, ReconcilerSettings, COMPOSE_CHANGED, TEMPLATE_NOT_SET};
