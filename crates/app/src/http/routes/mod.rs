pub mod health;
pub mod prompts;
pub mod search;
pub mod tags;
