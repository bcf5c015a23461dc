//! # Configuration Module
//!
//! Centralizes the tree shape constants and the page tag bytes. Constants
//! that depend on each other are co-located and guarded by compile-time
//! assertions so a mismatched edit fails the build instead of corrupting
//! pages.
//!
//! - [`constants`]: fan-out, slot width, and tag values with dependency
//!   documentation

pub mod constants;
pub use constants::*;
