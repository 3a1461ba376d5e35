//! The REST server: the persistence collaborator as seen over HTTP.
//!
//! Every handler runs one short synchronous statement batch under the
//! connection lock; none of them hold it across an await.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use log::{debug, error, info};
use rusqlite::Connection;
use serde_json::json;
use tokio::net::TcpListener;

use crate::api::{Ack, ReorderRequest};
use crate::error::BoardError;
use crate::model::{NewTask, Task, TaskId, TaskPatch};
use crate::ops;

type Db = Arc<Mutex<Connection>>;

/// Wraps any failure so handlers can use `?`.
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0.downcast_ref::<BoardError>() {
            Some(BoardError::TaskNotFound(_)) => (StatusCode::NOT_FOUND, "Task not found".to_string()),
            Some(e @ BoardError::EmptyTitle) => (StatusCode::BAD_REQUEST, e.to_string()),
            _ => {
                error!("request failed: {:#}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", self.0))
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn lock(db: &Db) -> MutexGuard<'_, Connection> {
    // A panicked handler can't leave a half-applied write: reorder is
    // transactional and the rest are single statements.
    db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn list_tasks(State(db): State<Db>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(ops::list_tasks(&lock(&db))?))
}

async fn create_task(
    State(db): State<Db>,
    Json(new): Json<NewTask>,
) -> Result<Json<Task>, ApiError> {
    let task = ops::add_task(&lock(&db), &new)?;
    debug!("created task {} in {}", task.id, task.column_id);
    Ok(Json(task))
}

async fn update_task(
    State(db): State<Db>,
    Path(id): Path<TaskId>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(ops::update_task(&lock(&db), id, &patch)?))
}

async fn delete_task(State(db): State<Db>, Path(id): Path<TaskId>) -> Result<Json<Ack>, ApiError> {
    let existed = ops::delete_task(&lock(&db), id)?;
    debug!("delete task {id} (existed: {existed})");
    Ok(Json(Ack { success: true }))
}

async fn reorder(
    State(db): State<Db>,
    Json(body): Json<ReorderRequest>,
) -> Result<Json<Ack>, ApiError> {
    let applied = ops::reorder(&lock(&db), &body.tasks)?;
    debug!("reorder: {applied} of {} placements applied", body.tasks.len());
    Ok(Json(Ack { success: true }))
}

pub fn router(conn: Connection) -> Router {
    let db: Db = Arc::new(Mutex::new(conn));
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/reorder", post(reorder))
        .route("/api/tasks/{id}", put(update_task).delete(delete_task))
        .with_state(db)
}

/// Serve on an already-bound listener until ctrl-c.
pub async fn serve_listener(listener: TcpListener, conn: Connection) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("serving workplan on http://{addr}");
    axum::serve(listener, router(conn))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await?;
    Ok(())
}

pub async fn serve(addr: SocketAddr, conn: Connection) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, conn).await
}
