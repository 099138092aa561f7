//! `bd serve`: run the HTTP API.
//!
//! Single-tenant mode serves one data file behind one bearer token.
//! `--projects` switches to multi-tenant mode, one store per project entry.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use beads_core::config::{default_data_file, load_projects};
use beads_core::tenant::{MultiTenant, ProjectInfo, SingleTenant, TenantRegistry};
use beads_core::{IssueStore, StoreOptions};
use beads_server::AppState;
use clap::Args;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8420";

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "BEADS_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Data file for single-tenant mode.
    #[arg(long, env = "BEADS_DATA_FILE", conflicts_with = "projects")]
    pub data_file: Option<PathBuf>,

    /// Projects file (TOML or JSON) for multi-tenant mode.
    #[arg(long, env = "BEADS_PROJECTS")]
    pub projects: Option<PathBuf>,

    /// Prefix for newly generated ids.
    #[arg(long, env = "BEADS_ID_PREFIX", default_value = "bd")]
    pub id_prefix: String,
}

fn build_registry(args: &ServeArgs, token: Option<&str>) -> anyhow::Result<Arc<dyn TenantRegistry>> {
    let options = StoreOptions {
        id_prefix: args.id_prefix.clone(),
        ..StoreOptions::default()
    };

    if let Some(path) = &args.projects {
        let projects = load_projects(path)
            .with_context(|| format!("loading projects from {}", path.display()))?;
        let registry = MultiTenant::open(&projects, &options)?;
        tracing::info!(projects = projects.len(), "multi-tenant mode");
        return Ok(Arc::new(registry));
    }

    let token = token
        .filter(|t| !t.is_empty())
        .context("single-tenant mode needs a token; pass --token or set BEADS_TOKEN")?;
    let data_file = args.data_file.clone().unwrap_or_else(default_data_file);
    let store = IssueStore::open(&data_file, &options)
        .with_context(|| format!("opening {}", data_file.display()))?;
    tracing::info!(data_file = %data_file.display(), items = store.len(), "single-tenant mode");
    let info = ProjectInfo {
        name: "default".to_string(),
        data_file,
    };
    Ok(Arc::new(SingleTenant::new(token, info, Arc::new(store))))
}

pub fn run_serve(args: &ServeArgs, token: Option<&str>) -> anyhow::Result<()> {
    let registry = build_registry(args, token)?;
    let state = Arc::new(AppState::new(registry));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    runtime
        .block_on(beads_server::serve(&args.addr, state))
        .with_context(|| format!("serving on {}", args.addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ServeArgs,
    }

    #[test]
    fn defaults() {
        let w = Wrapper::parse_from(["test"]);
        assert_eq!(w.args.id_prefix, "bd");
        assert!(w.args.projects.is_none());
    }

    #[test]
    fn data_file_and_projects_conflict() {
        let result =
            Wrapper::try_parse_from(["test", "--data-file", "a.json", "--projects", "p.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn single_tenant_without_token_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("beads.json");
        let w = Wrapper::parse_from(["test", "--data-file", file.to_str().unwrap()]);
        let err = build_registry(&w.args, None).err().unwrap();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn single_tenant_opens_missing_file_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("beads.json");
        let w = Wrapper::parse_from(["test", "--data-file", file.to_str().unwrap()]);
        let registry = build_registry(&w.args, Some("t0k")).unwrap();
        let projects = registry.projects();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "default");
        assert!(registry.resolve("t0k").is_some());
    }
}
