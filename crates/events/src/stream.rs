//! Live progress stream for one job.
//!
//! Polls a [`ProgressReader`] and yields an event only when something a
//! watcher cares about changed. The stream always ends after a single
//! terminal event ([`ProgressEvent::Done`] or [`ProgressEvent::NotFound`]).

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use litessay_core::job_events::{
    STREAM_EVENT_DONE, STREAM_EVENT_ERROR, STREAM_EVENT_KEEPALIVE, STREAM_EVENT_PROGRESS,
};
use litessay_core::types::DbId;
use litessay_db::models::status::JobStatus;
use serde_json::json;
use tokio::time::Instant;

use crate::progress::{JobProgressView, ProgressReader, ProgressSnapshot};

/// Default delay between two reads of the job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default idle time after which a keepalive is emitted.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    pub poll_interval: Duration,
    pub keepalive_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Progress {
        step: String,
        detail: String,
        running_summary: Option<String>,
    },
    Keepalive,
    NotFound,
    Done {
        status: JobStatus,
        error: Option<String>,
    },
}

impl ProgressEvent {
    /// Server-sent-event name for this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => STREAM_EVENT_PROGRESS,
            Self::Keepalive => STREAM_EVENT_KEEPALIVE,
            Self::NotFound => STREAM_EVENT_ERROR,
            Self::Done { .. } => STREAM_EVENT_DONE,
        }
    }

    /// JSON payload for this event.
    pub fn data(&self) -> serde_json::Value {
        match self {
            Self::Progress {
                step,
                detail,
                running_summary,
            } => {
                let mut data = json!({ "step": step, "detail": detail });
                if let Some(summary) = running_summary {
                    data["running_summary"] = json!(summary);
                }
                data
            }
            Self::Keepalive => json!({}),
            Self::NotFound => json!({ "error": "Job not found" }),
            Self::Done { status, error } => {
                let mut data = json!({ "status": status.as_str() });
                if let Some(error) = error {
                    data["error"] = json!(error);
                }
                data
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::NotFound)
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// Build the event stream for `job_id`.
///
/// The first read happens immediately; later reads are spaced by
/// `config.poll_interval`.
pub fn progress_stream(
    reader: Arc<dyn ProgressReader>,
    job_id: DbId,
    config: StreamConfig,
) -> impl Stream<Item = ProgressEvent> + Send {
    let state = StreamState {
        reader,
        job_id,
        config,
        last_seen: None,
        last_emit: Instant::now(),
        polled: false,
        pending_done: None,
        finished: false,
    };
    stream::unfold(state, |mut state| async move {
        let event = state.next_event().await?;
        Some((event, state))
    })
}

type ProgressKey = (String, String, Option<String>);

struct StreamState {
    reader: Arc<dyn ProgressReader>,
    job_id: DbId,
    config: StreamConfig,
    last_seen: Option<ProgressKey>,
    last_emit: Instant,
    polled: bool,
    pending_done: Option<ProgressEvent>,
    finished: bool,
}

impl StreamState {
    async fn next_event(&mut self) -> Option<ProgressEvent> {
        if let Some(done) = self.pending_done.take() {
            self.finished = true;
            return Some(done);
        }
        if self.finished {
            return None;
        }

        loop {
            if self.polled {
                tokio::time::sleep(self.config.poll_interval).await;
            }
            self.polled = true;

            match self.reader.read(self.job_id).await {
                Ok(Some(view)) => {
                    let done = done_event(&view);
                    if let Some(progress) = self.changed_progress(view) {
                        self.last_emit = Instant::now();
                        self.pending_done = done;
                        return Some(progress);
                    }
                    if let Some(done) = done {
                        self.finished = true;
                        return Some(done);
                    }
                }
                Ok(None) => {
                    self.finished = true;
                    return Some(ProgressEvent::NotFound);
                }
                Err(e) => {
                    tracing::warn!(job_id = self.job_id, error = %e, "Progress read failed");
                }
            }

            if self.last_emit.elapsed() >= self.config.keepalive_interval {
                self.last_emit = Instant::now();
                return Some(ProgressEvent::Keepalive);
            }
        }
    }

    /// A progress event if the step snapshot differs from the last one seen.
    fn changed_progress(&mut self, view: JobProgressView) -> Option<ProgressEvent> {
        let Some(ProgressSnapshot::Step {
            current_step,
            detail,
            running_summary,
        }) = view.progress
        else {
            return None;
        };

        let key = (current_step, detail, running_summary);
        if self.last_seen.as_ref() == Some(&key) {
            return None;
        }
        self.last_seen = Some(key.clone());

        let (step, detail, running_summary) = key;
        Some(ProgressEvent::Progress {
            step,
            detail,
            running_summary,
        })
    }
}

fn done_event(view: &JobProgressView) -> Option<ProgressEvent> {
    if !view.status.is_terminal() {
        return None;
    }
    let error = match &view.progress {
        Some(ProgressSnapshot::Error { error }) => Some(error.clone()),
        _ => None,
    };
    Some(ProgressEvent::Done {
        status: view.status,
        error,
    })
}
