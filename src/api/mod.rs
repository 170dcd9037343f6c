//! REST API module
//!
//! Provides HTTP access to the vault coordinator. Errors are returned as
//! `{"code": ..., "error": ...}` with a matching status.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness and network
//! - `POST /api/requests` - Dispatch a typed `Request`
//!
//! ## Vaults
//! - `GET /api/vaults?signer=&vaultId=&refresh=` - List vaults
//! - `POST /api/vaults` - Create a vault
//! - `GET /api/vaults/{id}/transactions` - List drafts
//! - `POST /api/vaults/{id}/transactions` - Propose a spend
//!
//! ## Drafts
//! - `GET /api/transactions/{id}/signatures` - Shared signatures
//! - `POST /api/transactions/{id}/sign` - Sign with the server account
//! - `GET /api/transactions/{id}/status` - Signing progress
//! - `POST /api/transactions/{id}/execute` - Broadcast

pub mod handlers;
pub mod routes;

pub use handlers::ApiState;
pub use routes::{create_router, serve};
