//! [`TaskApi`] over the REST interface served by `workplan serve`.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::api::{Ack, ReorderRequest, TaskApi};
use crate::error::BoardError;
use crate::model::{NewTask, Placement, Task, TaskId, TaskPatch};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpApi {
    client: Client,
    base: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpApi {
    /// `base` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/tasks{path}", self.base)
    }
}

/// Turn non-success statuses into errors, surfacing the server's `error`
/// message when it sent one. A 404 for a known id becomes
/// [`BoardError::TaskNotFound`].
fn check_response(resp: Response, id: Option<TaskId>) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if let (StatusCode::NOT_FOUND, Some(id)) = (status, id) {
        return Err(BoardError::TaskNotFound(id).into());
    }
    let body = resp.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);
    if status == StatusCode::BAD_REQUEST && message.contains("title") {
        return Err(BoardError::EmptyTitle.into());
    }
    anyhow::bail!("server returned {status}: {message}")
}

fn expect_ack(resp: Response) -> Result<()> {
    let ack: Ack = resp.json().context("malformed acknowledgement")?;
    if !ack.success {
        anyhow::bail!("server did not acknowledge the write");
    }
    Ok(())
}

impl TaskApi for HttpApi {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        let resp = self
            .client
            .get(self.url(""))
            .send()
            .with_context(|| format!("failed to reach {}", self.base))?;
        let tasks = check_response(resp, None)?
            .json()
            .context("malformed task list")?;
        Ok(tasks)
    }

    fn create_task(&self, new: &NewTask) -> Result<Task> {
        let resp = self
            .client
            .post(self.url(""))
            .json(new)
            .send()
            .with_context(|| format!("failed to reach {}", self.base))?;
        let task = check_response(resp, None)?
            .json()
            .context("malformed task in create response")?;
        Ok(task)
    }

    fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task> {
        let resp = self
            .client
            .put(self.url(&format!("/{id}")))
            .json(patch)
            .send()
            .with_context(|| format!("failed to reach {}", self.base))?;
        let task = check_response(resp, Some(id))?
            .json()
            .context("malformed task in update response")?;
        Ok(task)
    }

    fn delete_task(&self, id: TaskId) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/{id}")))
            .send()
            .with_context(|| format!("failed to reach {}", self.base))?;
        expect_ack(check_response(resp, Some(id))?)
    }

    fn reorder(&self, batch: &[Placement]) -> Result<()> {
        let body = ReorderRequest {
            tasks: batch.to_vec(),
        };
        let resp = self
            .client
            .post(self.url("/reorder"))
            .json(&body)
            .send()
            .with_context(|| format!("failed to reach {}", self.base))?;
        expect_ack(check_response(resp, None)?)
    }
}
