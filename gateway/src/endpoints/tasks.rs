//! Read endpoints: `GET /tasks/{id}` and `GET /tasks` (§6).

use axum::extract::{Path, Query, State};
use axum::Json;
use relay_db::TaskListFilter;
use relay_types::RelayError;
use serde::Deserialize;
use uuid::Uuid;

use crate::dto::TaskDto;
use crate::owner::ResolvedOwner;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GetTaskQuery {
    #[serde(default)]
    pub include_children: bool,
}

/// `GET /tasks/{id}` (§6). `includeChildren=true` adds a `childTasks` array
/// ordered by creation.
pub async fn get_task(
    State(state): State<AppState>,
    ResolvedOwner(owner): ResolvedOwner,
    Path(id): Path<Uuid>,
    Query(query): Query<GetTaskQuery>,
) -> Result<Json<TaskDto>, RelayError> {
    let task = state
        .task_store
        .get(id)
        .await?
        .ok_or_else(|| RelayError::TaskNotFound { id: id.to_string() })?;

    if task.owner != owner {
        return Err(RelayError::TaskNotFound { id: id.to_string() });
    }

    let dto = if query.include_children {
        let children = state.task_store.children(id).await?;
        TaskDto::from(&task).with_children(children)
    } else {
        TaskDto::from(&task)
    };
    Ok(Json(dto))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    pub tool_id: Option<String>,
    #[serde(default)]
    pub root_only: bool,
    #[serde(default)]
    pub include_children: bool,
    pub limit: Option<i64>,
}

/// `GET /tasks?toolId=&rootOnly=&includeChildren=&limit=` (§6): recent-tasks
/// listing, scoped to the resolved owner.
pub async fn list_tasks(
    State(state): State<AppState>,
    ResolvedOwner(owner): ResolvedOwner,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<TaskDto>>, RelayError> {
    let filter = TaskListFilter {
        owner: Some(owner),
        tool_slug: query.tool_id,
        root_only: query.root_only,
        include_children: query.include_children,
        limit: query.limit.unwrap_or(50),
    };
    let tasks = state.task_store.list(filter).await?;

    let mut dtos = Vec::with_capacity(tasks.len());
    for task in &tasks {
        let dto = if query.include_children {
            let children = state.task_store.children(task.id).await?;
            TaskDto::from(task).with_children(children)
        } else {
            TaskDto::from(task)
        };
        dtos.push(dto);
    }
    Ok(Json(dtos))
}
