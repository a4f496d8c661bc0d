//! Credential validation adapters.

mod jwt_token_validator;

pub use jwt_token_validator::JwtTokenValidator;
