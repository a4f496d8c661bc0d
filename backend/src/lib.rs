//! Account-management backend.
//!
//! A CRUD account service behind a per-call authentication gate. Every
//! mutating operation flows through an ordered, short-circuiting validation
//! pipeline before it may touch persisted state; see [`domain::pipeline`].
//!
//! Layout follows the hexagonal split: [`inbound`] adapters drive the
//! [`domain`], which reaches collaborators only through its ports,
//! implemented under [`outbound`].

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;

pub use doc::ApiDoc;
pub use middleware::Trace;
