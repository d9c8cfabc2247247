//! # Stabilo-Core
//!
//! Core types, configuration and geometry shared by the stabilo
//! postural-stability and respiratory analysis engine.

pub mod buffer;
pub mod config;
pub mod error;
pub mod geometry;
pub mod stats;
pub mod sway;
pub mod types;

pub use buffer::RingBuffer;
pub use config::*;
pub use error::{Error, Result};
pub use geometry::*;
pub use sway::*;
pub use types::*;
