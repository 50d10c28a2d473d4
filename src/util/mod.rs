//! Utility modules: retry classification, timeout.

pub mod retry;
pub mod timeout;
