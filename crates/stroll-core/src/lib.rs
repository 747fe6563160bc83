//! # stroll-core
//! Foundation types and traits for the stroll trace evaluation engine.

pub mod constants;
pub mod context;
pub mod error;
pub mod traits;
pub mod types;
