use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "flock", about = "Administration tool for a flock database", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file; defaults to config/default.toml plus
    /// config/$FLOCK_ENV.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Rebuild the search index of an entity from the database
    Reindex(ReindexArgs),
    /// Query the search index and print matching rows
    Search(SearchArgs),
}

/// Entities that have a search index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Entity {
    Post,
}

#[derive(Args)]
pub struct ReindexArgs {
    pub entity: Entity,
}

#[derive(Args)]
pub struct SearchArgs {
    pub entity: Entity,

    pub query: String,

    #[arg(long, default_value_t = 1)]
    pub page: u64,

    #[arg(long, default_value_t = 10)]
    pub per_page: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from(["flock", "search", "post", "hello", "--page", "2"])
            .map_err(|e| e.to_string());
        let Ok(Cli {
            command: Command::Search(args),
            ..
        }) = cli
        else {
            panic!("expected search command");
        };

        assert_eq!(args.entity, Entity::Post);
        assert_eq!(args.query, "hello");
        assert_eq!(args.page, 2);
        assert_eq!(args.per_page, 10);
    }

    #[test]
    fn test_parse_reindex_rejects_unknown_entity() {
        assert!(Cli::try_parse_from(["flock", "reindex", "message"]).is_err());
    }
}
