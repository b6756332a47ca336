//! Request handlers.

pub mod exports;
pub mod health;

pub use exports::*;
pub use health::*;
