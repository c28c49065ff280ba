//! Authentication and authorization for the HDB API
//!
//! Provides:
//! - Per-request sessions passed explicitly through every operation
//! - The on-behalf gate that turns a delegation code into an acting user
//! - Delegation code resolution backed by memory or MongoDB
//! - JWT bearer tokens for users who logged in
//! - Password hashing with Argon2

pub mod credentials;
pub mod gate;
pub mod jwt;
pub mod on_behalf;
pub mod session;

pub use credentials::{hash_password, password_matches};
pub use gate::{authorize, AuthorizedSession, GateError, AUTHORIZATION_CODE_HEADER};
pub use jwt::{extract_token_from_header, Claims, JwtValidator};
pub use on_behalf::{HdbSettings, MemorySettings, MongoSettings, OnBehalfResolver};
pub use session::{RequestParams, Session, GUEST};
