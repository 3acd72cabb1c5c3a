//! Shared data model for the FileMart marketplace.

pub mod amount;
pub mod identity;
pub mod market;

pub use amount::*;
pub use identity::*;
pub use market::*;
