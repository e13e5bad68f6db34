//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "easel")]
#[command(about = "Artwork sharing client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Session token of the signed-in user
    #[arg(long, env = "EASEL_SESSION_TOKEN", global = true)]
    pub session: Option<String>,

    /// Public base URL for stored objects
    #[arg(long, env = "EASEL_PUBLIC_URL", global = true)]
    pub public_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database schema
    Init,

    /// Show the signed-in user and their roles
    Whoami,

    /// List the newest artworks
    ///
    /// Examples:
    ///   easel feed --limit 10
    ///   easel feed --search harbor
    Feed {
        /// Only show artworks whose title, description or author matches
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of artworks
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Show an artwork with its comments and tags
    Show {
        /// Artwork id
        artwork: String,
    },

    /// Favorite or unfavorite an artwork
    Favorite {
        /// Artwork id
        artwork: String,
    },

    /// Follow or unfollow a user
    Follow {
        /// User id
        user: String,
    },

    /// Comment on an artwork
    Comment {
        /// Artwork id
        artwork: String,

        /// Comment text
        text: String,
    },

    /// Upload an artwork
    ///
    /// Examples:
    ///   easel upload --title 'Harbor' --file harbor.png --tags 'sea, boats'
    Upload {
        #[arg(long)]
        title: String,

        /// Image file
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        description: Option<String>,

        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,
    },

    /// Developer console (developer or admin role required)
    Console {
        #[command(subcommand)]
        command: ConsoleCommands,
    },
}

#[derive(Subcommand)]
pub enum ConsoleCommands {
    /// Show platform statistics
    Stats,

    /// Show the roles of a user
    Roles {
        /// User id
        user: String,
    },

    /// Grant a role to a user
    Grant {
        /// User id
        user: String,

        /// Role: user, developer, moderator or admin
        role: String,
    },

    /// Revoke a role from a user
    Revoke {
        /// User id
        user: String,

        /// Role: user, developer, moderator or admin
        role: String,
    },
}
