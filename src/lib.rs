//! Identity-linked role reconciliation for the `users` collection.
//!
//! One reusable operation — [`reconcile`] — replaces the pile of one-off
//! maintenance scripts that each opened a connection, poked at a user row
//! and printed the result. Callers (the operator CLI, an admin endpoint, a
//! test harness) stay thin adapters over this library.

pub mod config;
pub mod db;
pub mod error;
pub mod reconcile;
pub mod users;

pub use error::Error;
pub use reconcile::{reconcile, Mode, Outcome};
pub use users::{Identity, Role, UserRecord, UserStore};
