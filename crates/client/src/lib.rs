//! `talentforge-client` — page bootstrap wiring.
//!
//! Builds the bus, session manager, orchestrator and access guard, drives the
//! one top-level init pass, and exposes the page-global accessors
//! (`current_user`, `is_authenticated`, `current_role`). Identity changes and
//! navigations funnel through one task that re-runs the guard.

pub mod app;

pub use app::{App, AppConfig};
