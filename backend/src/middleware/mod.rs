//! Application-level actix middleware.

pub mod trace;

pub use trace::Trace;
