//! App API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Access logger: method, path, status and latency
//! 2. Loading gate: 503 until the identity provider has reported

pub mod audit;
pub mod loading;
