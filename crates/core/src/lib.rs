pub mod domain;
pub mod error;
pub mod filter;
pub mod sanitize;
pub mod types;

pub use error::CoreError;
