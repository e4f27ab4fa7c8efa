//! Workspace, service, and API-contract discovery.

pub mod contracts;
pub mod service;
pub mod workspace;

pub use contracts::*;
pub use service::*;
pub use workspace::*;
