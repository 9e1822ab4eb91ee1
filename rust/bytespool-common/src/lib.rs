//! Error and result definitions shared by the bytespool-* crates.

pub mod error;
pub mod result;

pub use result::Result;
