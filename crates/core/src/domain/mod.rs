pub mod prompt;
pub mod search;
