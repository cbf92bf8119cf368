pub mod migrations;
pub mod pool;
pub mod prompts_repo;

pub use migrations::run_migrations;
pub use pool::{connect_lazy, DbPool, DbPoolError};
pub use prompts_repo::{
    copy_prompt, create_prompt, delete_prompt, find_prompt, list_prompts, ping, update_prompt,
    PromptsRepoError,
};
