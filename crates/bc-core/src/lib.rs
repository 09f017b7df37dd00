//! BharatConnect identity core.
//!
//! This crate implements:
//! - The key container abstraction and two software containers
//! - Device identity provisioning (lookup-then-create, never regenerate)
//! - Envelope encryption and master-key wrapping against the identity key
//! - The `CryptoService` façade and its typed bridge dispatch
//!
//! All operations are synchronous. Callers that need a deadline wrap calls
//! at their own boundary.

#![forbid(unsafe_code)]

// Key containers
pub mod keystore;
pub mod locks;

// Services
pub mod identity;
pub mod envelope;
pub mod service;
pub mod dispatch;

// Supporting modules
pub mod errors;
pub mod config;

pub use config::CoreConfig;
pub use errors::{CoreError, ErrorKind, ErrorReply};
pub use identity::{IdentityManager, IdentityState};
pub use service::CryptoService;
