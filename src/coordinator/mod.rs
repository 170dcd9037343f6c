//! Vault coordination service
//!
//! Typed requests in, typed responses out. The HTTP API and the CLI are thin
//! front ends over `Coordinator::handle`.

pub mod request;
pub mod service;

pub use request::{CoordinatorError, ExecutionReceipt, Request, Response, SigningStatus};
pub use service::{Coordinator, CoordinatorConfig};
