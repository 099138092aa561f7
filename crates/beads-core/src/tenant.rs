//! Bearer-token routing to per-tenant stores.
//!
//! The core store is tenant-agnostic; the boundary hands the request's token
//! to a [`TenantRegistry`] and works with whichever store comes back. Tokens
//! are compared in constant time and never appear in [`ProjectInfo`].

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{ConfigError, ProjectEntry, validate_projects};
use crate::error::StoreError;
use crate::store::{IssueStore, StoreOptions};

/// Project listing safe to show to any authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    pub name: String,
    pub data_file: PathBuf,
}

pub trait TenantRegistry: Send + Sync {
    /// The store bound to `token`, if any.
    fn resolve(&self, token: &str) -> Option<Arc<IssueStore>>;

    fn projects(&self) -> Vec<ProjectInfo>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("open project '{name}': {source}")]
    Open {
        name: String,
        #[source]
        source: StoreError,
    },
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ---------------------------------------------------------------------------
// Single tenant
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SingleTenant {
    token: String,
    info: ProjectInfo,
    store: Arc<IssueStore>,
}

impl SingleTenant {
    pub fn new(token: impl Into<String>, info: ProjectInfo, store: Arc<IssueStore>) -> Self {
        Self {
            token: token.into(),
            info,
            store,
        }
    }
}

impl TenantRegistry for SingleTenant {
    fn resolve(&self, token: &str) -> Option<Arc<IssueStore>> {
        (!self.token.is_empty() && constant_time_eq(self.token.as_bytes(), token.as_bytes()))
            .then(|| Arc::clone(&self.store))
    }

    fn projects(&self) -> Vec<ProjectInfo> {
        vec![self.info.clone()]
    }
}

// ---------------------------------------------------------------------------
// Multi tenant
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Tenant {
    token: String,
    info: ProjectInfo,
    store: Arc<IssueStore>,
}

#[derive(Debug)]
pub struct MultiTenant {
    tenants: Vec<Tenant>,
}

impl MultiTenant {
    /// Validate `projects` and open one store per entry.
    pub fn open(projects: &[ProjectEntry], options: &StoreOptions) -> Result<Self, RegistryError> {
        validate_projects(projects)?;
        let mut stores = Vec::with_capacity(projects.len());
        for project in projects {
            let store = IssueStore::open(&project.data_file, options).map_err(|source| {
                RegistryError::Open {
                    name: project.name.clone(),
                    source,
                }
            })?;
            tracing::info!(project = %project.name, data_file = %project.data_file.display(), "tenant ready");
            stores.push((project.clone(), Arc::new(store)));
        }
        Self::from_stores(stores)
    }

    /// Build from already-open stores. The entries are copied in.
    pub fn from_stores(
        stores: Vec<(ProjectEntry, Arc<IssueStore>)>,
    ) -> Result<Self, RegistryError> {
        let entries: Vec<ProjectEntry> = stores.iter().map(|(entry, _)| entry.clone()).collect();
        validate_projects(&entries)?;
        let tenants = stores
            .into_iter()
            .map(|(entry, store)| Tenant {
                token: entry.token,
                info: ProjectInfo {
                    name: entry.name,
                    data_file: entry.data_file,
                },
                store,
            })
            .collect();
        Ok(Self { tenants })
    }
}

impl TenantRegistry for MultiTenant {
    fn resolve(&self, token: &str) -> Option<Arc<IssueStore>> {
        let mut found = None;
        for tenant in &self.tenants {
            if constant_time_eq(tenant.token.as_bytes(), token.as_bytes()) {
                found = Some(Arc::clone(&tenant.store));
            }
        }
        found
    }

    fn projects(&self) -> Vec<ProjectInfo> {
        self.tenants.iter().map(|t| t.info.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewItem;
    use crate::persist::MemorySnapshot;

    fn memory_store() -> Arc<IssueStore> {
        Arc::new(IssueStore::from_parts(
            Vec::new(),
            Arc::new(MemorySnapshot::new()),
            "bd",
        ))
    }

    fn entry(name: &str, token: &str) -> ProjectEntry {
        ProjectEntry {
            name: name.into(),
            token: token.into(),
            data_file: format!("{name}.json").into(),
        }
    }

    #[test]
    fn single_tenant_matches_only_its_token() {
        let registry = SingleTenant::new(
            "secret",
            ProjectInfo {
                name: "default".into(),
                data_file: "beads.json".into(),
            },
            memory_store(),
        );
        assert!(registry.resolve("secret").is_some());
        assert!(registry.resolve("secreT").is_none());
        assert!(registry.resolve("").is_none());
        assert_eq!(registry.projects()[0].name, "default");
    }

    #[test]
    fn empty_single_token_matches_nothing() {
        let registry = SingleTenant::new(
            "",
            ProjectInfo {
                name: "default".into(),
                data_file: "beads.json".into(),
            },
            memory_store(),
        );
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn tenants_are_isolated() {
        let registry = MultiTenant::from_stores(vec![
            (entry("a", "token-a"), memory_store()),
            (entry("b", "token-b"), memory_store()),
        ])
        .expect("registry");

        let a = registry.resolve("token-a").expect("tenant a");
        let b = registry.resolve("token-b").expect("tenant b");
        a.create(NewItem::titled("only in a")).expect("create");
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
        assert!(registry.resolve("token-c").is_none());
    }

    #[test]
    fn listing_never_carries_tokens() {
        let registry = MultiTenant::from_stores(vec![(entry("a", "token-a"), memory_store())])
            .expect("registry");
        let json = serde_json::to_string(&registry.projects()).expect("json");
        assert!(json.contains("\"a\""));
        assert!(!json.contains("token-a"));
    }

    #[test]
    fn registry_is_isolated_from_its_input() {
        let mut input = vec![(entry("a", "token-a"), memory_store())];
        let registry = MultiTenant::from_stores(input.clone()).expect("registry");
        input[0].0.token = "changed".into();
        assert!(registry.resolve("token-a").is_some());
        assert!(registry.resolve("changed").is_none());
    }

    #[test]
    fn duplicate_tokens_are_rejected() {
        let err = MultiTenant::from_stores(vec![
            (entry("a", "same"), memory_store()),
            (entry("b", "same"), memory_store()),
        ])
        .expect_err("must fail");
        assert!(matches!(err, RegistryError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn open_creates_stores_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let projects = vec![ProjectEntry {
            name: "disk".into(),
            token: "t".into(),
            data_file: dir.path().join("disk.json"),
        }];
        let registry = MultiTenant::open(&projects, &StoreOptions::default()).expect("open");
        let store = registry.resolve("t").expect("tenant");
        store.create(NewItem::titled("persisted")).expect("create");
        assert!(dir.path().join("disk.json").exists());
    }
}
