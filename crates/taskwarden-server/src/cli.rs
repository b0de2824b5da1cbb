use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "taskwarden-server", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Serve,
    Migrate,
    /// Creates a user directly in the database, bypassing authorization.
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        admin: bool,
    },
    CreateApiKey {
        #[arg(long)]
        email: String,
    },
    RevokeApiKey {
        #[arg(long)]
        key_id: String,
    },
}
