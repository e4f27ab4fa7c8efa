//! # Domain Layer
//!
//! Core business models, the error taxonomy, and pure services. This
//! layer is independent of storage, transport, and parser frameworks.

pub mod error;
pub mod models;
pub mod services;

pub use error::*;
pub use models::*;
pub use services::*;
