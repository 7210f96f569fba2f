mod logging;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::sync::Arc;
use tagcache::{ClearSpec, QueryCache, QueryCacheConfig};
use tagcache_store::{CacheConfig, CacheError, RedisStore, TagStore};
use tracing::info;

#[derive(Parser)]
#[command(name = "tagcache-cli")]
#[command(about = "tagcache CLI - Inspect and invalidate cached query results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Invalidate entries of a namespace (everything if no target is given)
    Clear {
        /// Namespace to clear
        namespace: String,

        /// Entity ids; also clears paginate, list and remember entries
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<u64>,

        /// Remembered keys
        #[arg(long = "key", value_name = "KEY")]
        keys: Vec<String>,

        /// Raw tags, used verbatim
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Clear every paginated result
        #[arg(long)]
        paginate: bool,

        /// Clear every list result
        #[arg(long)]
        list: bool,

        /// Clear every remembered value
        #[arg(long)]
        remember: bool,

        /// Clear the whole namespace
        #[arg(long)]
        all: bool,
    },
    /// Invalidate every entry carrying a raw tag
    Forget {
        /// Tag to invalidate
        tag: String,
    },
    /// Print a stored entry and its remaining TTL
    Inspect {
        /// Full cache key, e.g. users:first:5
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logging::init_console_logging();

    let cli = Cli::parse();
    let config = CacheConfig::from_env();
    let store = RedisStore::new(&config.redis_url, &config.key_prefix)
        .await
        .with_context(|| format!("connecting to {}", config.redis_url))?;

    match cli.command {
        Commands::Clear {
            namespace,
            ids,
            keys,
            tags,
            paginate,
            list,
            remember,
            all,
        } => {
            let cache = QueryCache::<serde_json::Value>::new(
                QueryCacheConfig::from_cache_config(namespace, &config),
                Arc::new(store),
            )?;

            let mut spec = ClearSpec::keys(keys).with_tags(tags);
            if !ids.is_empty() {
                spec = spec.with_ids(ids);
            }
            spec.paginate |= paginate;
            spec.list |= list;
            spec.remember |= remember;
            spec.all = all;

            let targets = spec.resolve(cache.namespace());
            cache.clear(&spec).await?;
            info!(namespace = %cache.namespace(), tags = ?targets, "Cleared");
            println!("✅ Cleared {} tag(s) in {}", targets.len(), cache.namespace());
        }
        Commands::Forget { tag } => {
            store.invalidate_tags(std::slice::from_ref(&tag)).await?;
            println!("✅ Forgot entries tagged {tag}");
        }
        Commands::Inspect { key } => match store.get_with_ttl(&key).await {
            Ok((value, ttl)) => {
                println!("ttl: {}s", ttl.as_secs());
                println!("{value}");
            }
            Err(CacheError::NotFound) => println!("❌ {key} is not cached"),
            Err(e) => return Err(e.into()),
        },
    }

    Ok(())
}
