//! Shared types

mod error;

pub use error::{HdbError, Result};
