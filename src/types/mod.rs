//! Core types for Tycho.

pub mod chat;
pub mod item;

pub use chat::*;
pub use item::*;
