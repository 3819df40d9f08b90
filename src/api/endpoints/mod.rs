//! App API endpoint handlers.
//!
//! Each module corresponds to a screen or operation of the web shell.
//! Handlers are thin: they call the client modules and map errors.

pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod health;
pub mod onboarding;
pub mod triage;
