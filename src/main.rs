// SPDX-License-Identifier: MIT
//! Small CLI front-end: resolve one task reference and print it as JSON.
//!
//! Mostly useful for poking at a workspace while developing against the
//! engine; the library API is the real surface.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use taskbridge::{
    EngineConfig, HttpTaskGateway, ResolveOptions, Resolution, TaskRef, TaskResolver,
    ValidationCache,
};

#[derive(Parser)]
#[command(
    name = "taskbridge",
    about = "Resolve a task reference against a remote workspace",
    version
)]
struct Args {
    /// Canonical task id (custom-id-shaped values fall back automatically)
    #[arg(long)]
    id: Option<String>,

    /// User-defined custom id, e.g. DEV-1234
    #[arg(long)]
    custom_id: Option<String>,

    /// Task name to search for
    #[arg(long)]
    name: Option<String>,

    /// Scope a name/custom-id lookup to this list id
    #[arg(long)]
    list_id: Option<String>,

    /// Scope a name/custom-id lookup to this list name (exact)
    #[arg(long)]
    list_name: Option<String>,

    /// Return every match instead of failing on ambiguity
    #[arg(long)]
    multiple: bool,

    /// Disable smart disambiguation (score + recency picking)
    #[arg(long)]
    no_smart: bool,

    /// Only accept exact-tier name matches
    #[arg(long)]
    exact: bool,

    /// Include closed tasks in workspace-wide searches
    #[arg(long)]
    include_closed: bool,

    /// Enrich the result with list/folder/space names
    #[arg(long)]
    context: bool,

    /// Path to a config.toml (env vars take precedence)
    #[arg(long, env = "TASKBRIDGE_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = EngineConfig::load(args.config.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log)),
        )
        .with_writer(std::io::stderr)
        .init();

    let api_token = config
        .api_token
        .clone()
        .context("no API token configured — set TASKBRIDGE_API_TOKEN")?;
    let team_id = config
        .team_id
        .clone()
        .context("no workspace id configured — set TASKBRIDGE_TEAM_ID")?;

    let gateway = HttpTaskGateway::new(
        config.api_base_url.clone(),
        api_token,
        team_id,
        config.http_timeout(),
    )?;
    let resolver = TaskResolver::new(
        Arc::new(gateway),
        ValidationCache::new(config.cache_ttl_secs),
    );

    let task_ref = TaskRef {
        id: args.id,
        custom_id: args.custom_id,
        name: args.name,
        list_id: args.list_id,
        list_name: args.list_name,
    };
    let opts = ResolveOptions {
        allow_multiple_matches: args.multiple,
        smart_disambiguation: !args.no_smart,
        include_context: args.context,
        exact_only: args.exact,
        include_closed: args.include_closed,
        ..Default::default()
    };

    match resolver.resolve(&task_ref, &opts).await? {
        Resolution::Single(task) => println!("{}", serde_json::to_string_pretty(&task)?),
        Resolution::Multiple(tasks) => println!("{}", serde_json::to_string_pretty(&tasks)?),
    }
    Ok(())
}
