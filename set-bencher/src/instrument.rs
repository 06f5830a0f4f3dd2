//! Boundary to the tracing client that records the lifecycle of an invocation.
//!
//! Deployed functions report every invocation through an [`Instrumentation`] client: one
//! `start`, any number of `update`s and a final `done` that yields the trace record returned to
//! the caller. The client itself is an external collaborator; [`TraceRecorder`] is an in-process
//! implementation that collects events into a serializable [`Trace`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tags attached to a trace update.
pub type Tags = BTreeMap<String, String>;

/// Client recording start, update and completion events of one invocation.
pub trait Instrumentation {
    /// Per-invocation state, opaque to the dispatcher.
    type Context;
    /// The record produced when the invocation is finished.
    type Trace;

    /// Marks the start of the invocation.
    fn start(&self, cx: &mut Self::Context);

    /// Attaches an optional message and tags to the invocation.
    fn update(&self, cx: &mut Self::Context, message: Option<&str>, tags: Tags);

    /// Finishes the invocation and returns its trace.
    fn done(&self, cx: &mut Self::Context) -> Self::Trace;
}

/// A single update recorded on a [`Trace`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Time since the invocation started.
    #[serde(with = "humantime_serde")]
    pub offset: Duration,
    /// Free-form message, used for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Tags added by this update.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

/// Completed record of one invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Unique id of the invocation.
    pub id: Uuid,
    /// Hint naming the platform the function runs on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Wall-clock time of the start event.
    #[serde(with = "humantime_serde")]
    pub started_at: SystemTime,
    /// Time between the start and done events.
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// All updates in the order they were recorded.
    pub events: Vec<TraceEvent>,
    /// Union of all update tags, later updates overwriting earlier ones.
    pub tags: Tags,
}

impl Trace {
    /// Returns the value of a tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Returns all messages recorded on updates.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| e.message.as_deref())
    }
}

/// State of an invocation recorded by [`TraceRecorder`].
#[derive(Debug)]
pub struct Invocation {
    id: Uuid,
    started_at: SystemTime,
    started: Instant,
    events: Vec<TraceEvent>,
}

impl Invocation {
    /// Creates the state for a new invocation.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: SystemTime::now(),
            started: Instant::now(),
            events: Vec::new(),
        }
    }

    /// The id the trace will carry.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for Invocation {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process [`Instrumentation`] producing [`Trace`] records.
#[derive(Clone, Debug, Default)]
pub struct TraceRecorder {
    platform: Option<String>,
}

impl TraceRecorder {
    /// Creates a recorder that stamps every trace with the given platform hint.
    pub fn for_platform(platform: impl Into<String>) -> Self {
        Self {
            platform: Some(platform.into()),
        }
    }
}

impl Instrumentation for TraceRecorder {
    type Context = Invocation;
    type Trace = Trace;

    fn start(&self, cx: &mut Invocation) {
        cx.started_at = SystemTime::now();
        cx.started = Instant::now();
        cx.events.clear();
    }

    fn update(&self, cx: &mut Invocation, message: Option<&str>, tags: Tags) {
        cx.events.push(TraceEvent {
            offset: cx.started.elapsed(),
            message: message.map(str::to_owned),
            tags,
        });
    }

    fn done(&self, cx: &mut Invocation) -> Trace {
        let tags = cx
            .events
            .iter()
            .flat_map(|event| event.tags.clone())
            .collect();

        Trace {
            id: cx.id,
            platform: self.platform.clone(),
            started_at: cx.started_at,
            elapsed: cx.started.elapsed(),
            events: std::mem::take(&mut cx.events),
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_tags_win() {
        let recorder = TraceRecorder::for_platform("local");
        let mut cx = Invocation::new();

        recorder.start(&mut cx);
        recorder.update(&mut cx, None, Tags::from([("job".into(), "io".into())]));
        recorder.update(&mut cx, Some("boom"), Tags::from([("job".into(), "prime".into())]));
        let trace = recorder.done(&mut cx);

        assert_eq!(trace.id, cx.id());
        assert_eq!(trace.platform.as_deref(), Some("local"));
        assert_eq!(trace.events.len(), 2);
        assert_eq!(trace.tag("job"), Some("prime"));
        assert_eq!(trace.messages().collect::<Vec<_>>(), vec!["boom"]);
    }

    #[test]
    fn trace_serializes_to_json() {
        let recorder = TraceRecorder::default();
        let mut cx = Invocation::new();
        recorder.start(&mut cx);
        recorder.update(&mut cx, None, Tags::from([("job".into(), "idle".into())]));
        let trace = recorder.done(&mut cx);

        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["tags"]["job"], "idle");
        assert!(json.get("platform").is_none());

        let decoded: Trace = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.tags, trace.tags);
    }
}
