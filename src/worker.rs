//! Runs persistence calls on a background thread.
//!
//! The board hands jobs over and picks the replies up whenever it next looks,
//! so a slow server never stalls the event loop. Jobs run strictly in the
//! order they were submitted.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use log::debug;

use crate::api::TaskApi;
use crate::model::{NewTask, Placement, Task, TaskId, TaskPatch};

pub type JobId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    List,
    Create(NewTask),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
    Reorder(Vec<Placement>),
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::List => "list",
            Job::Create(_) => "create",
            Job::Update(..) => "update",
            Job::Delete(_) => "delete",
            Job::Reorder(_) => "reorder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listed(Vec<Task>),
    Created(Task),
    Updated(Task),
    Deleted,
    Reordered,
}

impl Outcome {
    pub fn into_tasks(self) -> Result<Vec<Task>> {
        match self {
            Outcome::Listed(tasks) => Ok(tasks),
            other => bail!("expected a task list, got {other:?}"),
        }
    }
}

#[derive(Debug)]
pub struct Reply {
    pub id: JobId,
    pub result: Result<Outcome>,
}

pub struct Worker {
    jobs: Sender<(JobId, Job)>,
    replies: Receiver<Reply>,
    next_id: JobId,
}

impl Worker {
    /// Move `api` onto its own thread. The thread exits once the worker is
    /// dropped and the job it is running (if any) finishes.
    pub fn spawn<A: TaskApi + Send + 'static>(api: A) -> Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<(JobId, Job)>();
        let (reply_tx, reply_rx) = mpsc::channel();
        thread::Builder::new()
            .name("workplan-api".into())
            .spawn(move || {
                for (id, job) in job_rx {
                    let result = run(&api, job);
                    if reply_tx.send(Reply { id, result }).is_err() {
                        break;
                    }
                }
            })
            .context("failed to start api worker")?;
        Ok(Self {
            jobs: job_tx,
            replies: reply_rx,
            next_id: 0,
        })
    }

    pub fn submit(&mut self, job: Job) -> Result<JobId> {
        self.next_id += 1;
        let id = self.next_id;
        debug!("job {id}: {}", job.name());
        self.jobs
            .send((id, job))
            .map_err(|_| anyhow!("api worker has stopped"))?;
        Ok(id)
    }

    /// The next finished job, if one is ready.
    pub fn try_recv(&self) -> Result<Option<Reply>> {
        match self.replies.try_recv() {
            Ok(reply) => Ok(Some(reply)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => bail!("api worker has stopped"),
        }
    }

    /// Block until the next job finishes.
    pub fn recv(&self) -> Result<Reply> {
        self.replies
            .recv()
            .map_err(|_| anyhow!("api worker has stopped"))
    }
}

fn run<A: TaskApi>(api: &A, job: Job) -> Result<Outcome> {
    Ok(match job {
        Job::List => Outcome::Listed(api.list_tasks()?),
        Job::Create(new) => Outcome::Created(api.create_task(&new)?),
        Job::Update(id, patch) => Outcome::Updated(api.update_task(id, &patch)?),
        Job::Delete(id) => {
            api.delete_task(id)?;
            Outcome::Deleted
        }
        Job::Reorder(batch) => {
            api.reorder(&batch)?;
            Outcome::Reordered
        }
    })
}
