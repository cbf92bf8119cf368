use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Apply database migrations and exit.
    #[arg(long, default_value_t = false, conflicts_with = "skip_migrations")]
    pub migrate_only: bool,
    #[arg(long, default_value_t = false)]
    pub skip_migrations: bool,
    /// Print a session token for the given owner id and exit.
    #[arg(long, value_name = "OWNER_ID")]
    pub issue_token: Option<i64>,
}
