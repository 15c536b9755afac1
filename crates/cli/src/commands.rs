use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use flock_common::{
    AppError, Config,
    config::{SearchBackendKind, SearchConfig},
};
use flock_core::{SearchService, build_search_index};
use flock_db::entities::Post;
use sea_orm::DatabaseConnection;
use tracing::info;

use crate::cli::{Cli, Command, Entity, ReindexArgs, SearchArgs};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let db = flock_db::init(&config)
        .await
        .with_context(|| format!("connecting to {}", config.database.url))?;

    match cli.command {
        Command::Migrate => cmd_migrate(&db).await,
        Command::Reindex(args) => {
            ensure_persistent_index(&config.search)?;
            cmd_reindex(search_service(&config, db)?, args).await
        }
        Command::Search(args) => {
            let rebuild = config.search.backend == SearchBackendKind::Memory;
            cmd_search(search_service(&config, db)?, args, rebuild).await
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::load().context("loading configuration")?,
    };
    Ok(config)
}

/// Log the [`AppError`] behind a failed command, if there is one, and
/// return its code.
pub fn log_failure(err: &anyhow::Error) -> Option<&'static str> {
    let app = err.downcast_ref::<AppError>()?;
    app.log();
    Some(app.error_code())
}

/// Reindexing only makes sense for an index that outlives this process.
fn ensure_persistent_index(search: &SearchConfig) -> anyhow::Result<()> {
    if !search.enabled {
        bail!("search is disabled; there is no index to rebuild");
    }
    if search.backend == SearchBackendKind::Memory {
        bail!(
            "the memory search backend is discarded when this command exits; \
             configure a meilisearch backend to rebuild a lasting index"
        );
    }
    Ok(())
}

fn search_service(config: &Config, db: DatabaseConnection) -> anyhow::Result<SearchService> {
    let index = build_search_index(&config.search)?;
    Ok(SearchService::new(Arc::new(db), index, config.search.clone()))
}

async fn cmd_migrate(db: &DatabaseConnection) -> anyhow::Result<()> {
    flock_db::migrate(db).await?;
    info!("Migrations applied");
    println!("Database is up to date.");
    Ok(())
}

async fn reindex(service: &SearchService, entity: Entity) -> anyhow::Result<u64> {
    let indexed = match entity {
        Entity::Post => service.reindex::<Post>().await?,
    };
    Ok(indexed)
}

async fn cmd_reindex(service: SearchService, args: ReindexArgs) -> anyhow::Result<()> {
    let indexed = reindex(&service, args.entity).await?;
    println!("Indexed {indexed} {:?} rows.", args.entity);
    Ok(())
}

async fn cmd_search(
    service: SearchService,
    args: SearchArgs,
    rebuild: bool,
) -> anyhow::Result<()> {
    // The in-memory index starts empty in every process.
    if rebuild {
        reindex(&service, args.entity).await?;
    }

    match args.entity {
        Entity::Post => {
            let (posts, total) = service
                .search::<Post>(&args.query, args.page, args.per_page)
                .await?;
            println!("{total} matches (page {}):", args.page);
            for post in posts {
                println!("  {}  {}  {}", post.id, post.created_at, post.body);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reindex_refuses_memory_backend() {
        let err = ensure_persistent_index(&SearchConfig::default()).unwrap_err();
        assert!(err.to_string().contains("memory search backend"));
    }

    #[test]
    fn test_reindex_refuses_disabled_search() {
        let search = SearchConfig {
            enabled: false,
            backend: SearchBackendKind::Meilisearch,
            ..SearchConfig::default()
        };
        assert!(ensure_persistent_index(&search).is_err());
    }

    #[test]
    fn test_reindex_accepts_meilisearch_backend() {
        let search = SearchConfig {
            backend: SearchBackendKind::Meilisearch,
            ..SearchConfig::default()
        };
        assert!(ensure_persistent_index(&search).is_ok());
    }

    #[test]
    fn test_log_failure_finds_app_error_under_context() {
        let err = anyhow::Error::from(AppError::SearchUnavailable("timeout".to_string()))
            .context("searching post");
        assert_eq!(log_failure(&err), Some("SEARCH_UNAVAILABLE"));
        assert_eq!(log_failure(&anyhow::anyhow!("plain failure")), None);
    }
}
