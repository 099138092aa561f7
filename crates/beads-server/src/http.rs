//! HTTP endpoint handlers.
//!
//! Path ids accept a unique prefix. Store calls run on the blocking pool:
//! the store lock is synchronous and saves hit the disk.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use beads_core::model::{IssueType, Item, ItemUpdate, NewItem, ParentChange, Priority, Status};
use beads_core::store::{Deps, ItemView, ListEntry, ListFilter, Page, PageRequest};
use beads_core::tenant::ProjectInfo;
use beads_core::{BeadRef, IssueStore, Mutation, StoreResult};

use crate::auth::Tenant;
use crate::{AppState, ApiError};

type ApiResult<T> = Result<T, ApiError>;

/// Run a store call on the blocking pool.
async fn run<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ApiError::Internal(format!("store task failed: {err}")))?
}

fn resolve_all(store: &IssueStore, ids: &[String]) -> StoreResult<Vec<String>> {
    ids.iter().map(|id| store.resolve(id.trim())).collect()
}

/// An item plus whatever the write freed.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    #[serde(flatten)]
    pub item: Item,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unblocked: Vec<BeadRef>,
}

impl From<Mutation> for MutationResponse {
    fn from(m: Mutation) -> Self {
        Self {
            item: m.item,
            unblocked: m.unblocked,
        }
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<Status>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(rename = "type", default)]
    pub issue_type: IssueType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub parent_id: String,
}

pub async fn create_bead(
    Extension(Tenant(store)): Extension<Tenant>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    let Json(request) = payload?;
    let item = run(move || {
        let blocked_by = resolve_all(&store, &request.blocked_by)?;
        let parent = request.parent_id.trim();
        let parent = if parent.is_empty() {
            None
        } else {
            Some(store.resolve(parent)?)
        };
        let new = NewItem {
            title: request.title,
            description: request.description,
            status: request.status,
            priority: request.priority,
            issue_type: request.issue_type,
            tags: request.tags,
            blocked_by,
            assignee: request.assignee,
        };
        let item = match parent {
            Some(parent) => store.create_with_parent(new, &parent)?,
            None => store.create(new)?,
        };
        Ok(item)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

pub async fn get_bead(
    Extension(Tenant(store)): Extension<Tenant>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<ItemView>> {
    let Path(id) = id?;
    run(move || {
        let id = store.resolve(&id)?;
        Ok(Json(store.view(&id)?))
    })
    .await
}

pub async fn get_deps(
    Extension(Tenant(store)): Extension<Tenant>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Deps>> {
    let Path(id) = id?;
    run(move || {
        let id = store.resolve(&id)?;
        Ok(Json(store.deps(&id)?))
    })
    .await
}

/// Query string of `GET /beads`. List-valued filters are comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub ready: bool,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(rename = "type")]
    pub issue_type: Option<String>,
    pub tag: Option<String>,
    pub assignee: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

fn split_csv(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
}

fn parse_csv<T>(raw: Option<&str>) -> ApiResult<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    split_csv(raw)
        .map(|part| T::from_str(part).map_err(|err| ApiError::bad_request(err.to_string())))
        .collect()
}

fn page_request(page: Option<usize>, per_page: Option<usize>) -> PageRequest {
    let default = PageRequest::default();
    PageRequest {
        page: page.unwrap_or(default.page),
        per_page: per_page.unwrap_or(default.per_page),
    }
}

impl ListQuery {
    pub fn into_filter(self) -> ApiResult<ListFilter> {
        Ok(ListFilter {
            all: self.all,
            ready: self.ready,
            statuses: parse_csv(self.status.as_deref())?,
            priorities: parse_csv(self.priority.as_deref())?,
            types: parse_csv(self.issue_type.as_deref())?,
            tags: split_csv(self.tag.as_deref()).map(str::to_string).collect(),
            assignee: self
                .assignee
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            page: page_request(self.page, self.per_page),
        })
    }
}

pub async fn list_beads(
    Extension(Tenant(store)): Extension<Tenant>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Page<ListEntry>>> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    run(move || Ok(Json(store.list(&filter)))).await
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

pub async fn search(
    Extension(Tenant(store)): Extension<Tenant>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<Page<ListEntry>>> {
    let Query(query) = query?;
    let page = page_request(query.page, query.per_page);
    run(move || Ok(Json(store.search(&query.q, page)?))).await
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

/// Partial update. Absent fields stay untouched; `parent_id: ""` detaches.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    #[serde(rename = "type")]
    pub issue_type: Option<IssueType>,
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub add_tags: Vec<String>,
    #[serde(default)]
    pub remove_tags: Vec<String>,
    pub blocked_by: Option<Vec<String>>,
    pub assignee: Option<String>,
    pub parent_id: Option<String>,
}

impl UpdateRequest {
    fn into_update(self, store: &IssueStore) -> StoreResult<ItemUpdate> {
        let blocked_by = self
            .blocked_by
            .map(|ids| resolve_all(store, &ids))
            .transpose()?;
        let parent = match self.parent_id.as_deref().map(str::trim) {
            None => None,
            Some("") => Some(ParentChange::Detach),
            Some(target) => Some(ParentChange::Attach(store.resolve(target)?)),
        };
        Ok(ItemUpdate {
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            issue_type: self.issue_type,
            tags: self.tags,
            add_tags: self.add_tags,
            remove_tags: self.remove_tags,
            blocked_by,
            assignee: self.assignee,
            parent,
        })
    }
}

pub async fn update_bead(
    Extension(Tenant(store)): Extension<Tenant>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> ApiResult<Json<MutationResponse>> {
    let Path(id) = id?;
    let Json(request) = payload?;
    run(move || {
        let id = store.resolve(&id)?;
        let change = request.into_update(&store)?;
        Ok(Json(store.update(&id, change)?.into()))
    })
    .await
}

pub async fn delete_bead(
    Extension(Tenant(store)): Extension<Tenant>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<MutationResponse>> {
    let Path(id) = id?;
    run(move || {
        let id = store.resolve(&id)?;
        Ok(Json(store.delete(&id)?.into()))
    })
    .await
}

// ---------------------------------------------------------------------------
// Claim / comments / links
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub user: String,
}

pub async fn claim_bead(
    Extension(Tenant(store)): Extension<Tenant>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> ApiResult<Json<Item>> {
    let Path(id) = id?;
    let Json(request) = payload?;
    run(move || {
        let id = store.resolve(&id)?;
        Ok(Json(store.claim(&id, &request.user)?))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub author: String,
    pub text: String,
}

pub async fn add_comment(
    Extension(Tenant(store)): Extension<Tenant>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let item = run(move || {
        let id = store.resolve(&id)?;
        Ok(store.add_comment(&id, &request.author, &request.text)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub blocked_by: String,
}

pub async fn link_bead(
    Extension(Tenant(store)): Extension<Tenant>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<LinkRequest>, JsonRejection>,
) -> ApiResult<Json<Item>> {
    let Path(id) = id?;
    let Json(request) = payload?;
    run(move || {
        let id = store.resolve(&id)?;
        let blocker = store.resolve(request.blocked_by.trim())?;
        Ok(Json(store.link(&id, &blocker)?))
    })
    .await
}

pub async fn unlink_bead(
    Extension(Tenant(store)): Extension<Tenant>,
    ids: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Json<Item>> {
    let Path((id, other)) = ids?;
    run(move || {
        let id = store.resolve(&id)?;
        let blocker = store.resolve(&other)?;
        Ok(Json(store.unlink(&id, &blocker)?))
    })
    .await
}

// ---------------------------------------------------------------------------
// Tenant-wide
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CleanRequest {
    pub days: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanResponse {
    pub removed: usize,
}

/// Age threshold for `days`, which must be finite and non-negative.
#[allow(clippy::cast_possible_truncation)]
pub fn clean_age(days: f64) -> ApiResult<TimeDelta> {
    if !days.is_finite() || days < 0.0 {
        return Err(ApiError::bad_request(
            "days must be a non-negative number",
        ));
    }
    let millis = (days * 86_400_000.0).round() as i64;
    Ok(TimeDelta::try_milliseconds(millis).unwrap_or(TimeDelta::MAX))
}

pub async fn clean(
    Extension(Tenant(store)): Extension<Tenant>,
    payload: Result<Json<CleanRequest>, JsonRejection>,
) -> ApiResult<Json<CleanResponse>> {
    let Json(request) = payload?;
    let age = clean_age(request.days)?;
    run(move || {
        let removed = store.clean_older_than(age)?;
        Ok(Json(CleanResponse { removed }))
    })
    .await
}

pub async fn list_projects(State(state): State<Arc<AppState>>) -> Json<Vec<ProjectInfo>> {
    Json(state.registry.projects())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "beads",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
