//! Single execution entry point shared by every platform adapter.
//!
//! Adapters decode their native invocation envelope into a [`Job`], call [`handle`] and encode
//! the returned trace into the platform's response shape.

use crate::instrument::{Instrumentation, Tags};
use crate::job::{IoTask, Job, Task, TaskKind};
use crate::store::{BoxedStore, S3Store, StoreConfig, StoreError};
use crate::tasks;
use crate::tasks::io::{IoReport, IoTaskError};

/// Executes `job` and records its outcome through `instrumentation`.
///
/// I/O jobs talk to the S3-compatible store described by the job itself.
pub async fn handle<I: Instrumentation>(
    instrumentation: &I,
    cx: &mut I::Context,
    job: &Job,
) -> I::Trace {
    handle_with(instrumentation, cx, job, |task| {
        let store: BoxedStore = Box::new(S3Store::connect(&StoreConfig::from(task))?);
        Ok(store)
    })
    .await
}

/// Like [`handle`], but obtains the store for I/O jobs from `connect`.
pub async fn handle_with<I, F>(
    instrumentation: &I,
    cx: &mut I::Context,
    job: &Job,
    connect: F,
) -> I::Trace
where
    I: Instrumentation,
    F: FnOnce(&IoTask) -> Result<BoxedStore, StoreError>,
{
    instrumentation.start(cx);

    match job.task() {
        Some(Task::Idle(duration)) => {
            tasks::idle(duration).await;
            instrumentation.update(cx, None, job_tag(TaskKind::Idle));
        }
        Some(Task::Prime(candidate)) => {
            let is_prime = tasks::prime(candidate);
            tracing::debug!(candidate, is_prime, "prime task finished");
            instrumentation.update(cx, None, job_tag(TaskKind::Prime));
        }
        Some(Task::Memory(task)) => {
            let report = tasks::memory(task);
            tracing::debug!(
                operations = report.operations,
                swaps = report.swaps,
                "memory task finished"
            );
            instrumentation.update(cx, None, job_tag(TaskKind::Memory));
        }
        Some(Task::Io(task)) => {
            let result = match connect(task) {
                Ok(store) => tasks::io(store.as_ref(), task).await,
                Err(err) => Err(IoTaskError::Connect(err)),
            };
            instrumentation.update(cx, None, job_tag(TaskKind::Io));

            match result {
                Ok(report) => instrumentation.update(cx, None, io_tags(&report)),
                Err(err) => {
                    let message = err.to_string();
                    instrumentation.update(cx, Some(&message), Tags::new());
                }
            }
        }
        None => tracing::warn!("received a job without any task"),
    }

    instrumentation.done(cx)
}

fn job_tag(kind: TaskKind) -> Tags {
    Tags::from([("job".to_owned(), kind.to_string())])
}

fn io_tags(report: &IoReport) -> Tags {
    // trace consumers read the write total under this spelling
    Tags::from([
        ("read".to_owned(), report.bytes_read.to_string()),
        ("writen".to_owned(), report.bytes_written.to_string()),
        ("errors".to_owned(), report.errors.to_string()),
    ])
}
