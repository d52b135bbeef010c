//! Per-project progress broadcast.
//!
//! Each project gets its own [`tokio::sync::broadcast`] channel plus a
//! bounded backlog of recent events. Publishing and subscribing both take
//! the channel registry lock, so a subscriber's backlog snapshot and its
//! live receiver are created atomically: no event is missed or duplicated
//! at the seam between the two.
//!
//! Per-project sequence numbers are assigned at publish time. Subscribers
//! on one channel always observe strictly increasing `seq` values; a
//! receiver that lags behind the live channel capacity loses the
//! overwritten events, which matches the bounded-backlog contract.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::types::Stage;

/// Capacity of each project's live channel. Lagging this far behind drops
/// the subscriber onto the reconnect-and-replay path.
const LIVE_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// The closed event vocabulary. Consumers match exhaustively; adding a kind
/// is a breaking change to every subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventKind {
    StepStart,
    StepComplete,
    StepError,
    WorkflowComplete,
}

impl ProgressEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressEventKind::StepStart => "step_start",
            ProgressEventKind::StepComplete => "step_complete",
            ProgressEventKind::StepError => "step_error",
            ProgressEventKind::WorkflowComplete => "workflow_complete",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Per-project sequence number, assigned at publish.
    pub seq: u64,
    pub project_id: Uuid,
    pub correlation_id: Uuid,
    pub stage: Stage,
    pub kind: ProgressEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    fn new(project_id: Uuid, correlation_id: Uuid, stage: Stage, kind: ProgressEventKind) -> Self {
        Self {
            seq: 0,
            project_id,
            correlation_id,
            stage,
            kind,
            document_version: None,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn step_start(project_id: Uuid, correlation_id: Uuid, stage: Stage) -> Self {
        Self::new(project_id, correlation_id, stage, ProgressEventKind::StepStart)
    }

    pub fn step_complete(
        project_id: Uuid,
        correlation_id: Uuid,
        stage: Stage,
        document_version: u64,
    ) -> Self {
        let mut event = Self::new(
            project_id,
            correlation_id,
            stage,
            ProgressEventKind::StepComplete,
        );
        event.document_version = Some(document_version);
        event
    }

    pub fn step_error(
        project_id: Uuid,
        correlation_id: Uuid,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        let mut event = Self::new(
            project_id,
            correlation_id,
            stage,
            ProgressEventKind::StepError,
        );
        event.message = Some(message.into());
        event
    }

    pub fn workflow_complete(project_id: Uuid, correlation_id: Uuid, stage: Stage) -> Self {
        Self::new(
            project_id,
            correlation_id,
            stage,
            ProgressEventKind::WorkflowComplete,
        )
    }
}

// ---------------------------------------------------------------------------
// ProgressBroadcaster
// ---------------------------------------------------------------------------

struct ProjectChannel {
    tx: broadcast::Sender<ProgressEvent>,
    backlog: VecDeque<ProgressEvent>,
    next_seq: u64,
}

impl ProjectChannel {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            tx,
            backlog: VecDeque::new(),
            next_seq: 0,
        }
    }
}

pub struct ProgressBroadcaster {
    backlog_size: usize,
    channels: Mutex<HashMap<Uuid, ProjectChannel>>,
}

impl ProgressBroadcaster {
    pub fn new(backlog_size: usize) -> Self {
        Self {
            backlog_size,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Stamp the event with the project's next sequence number, append it
    /// to the backlog and fan it out to live subscribers. Returns the event
    /// as published.
    pub async fn publish(&self, mut event: ProgressEvent) -> ProgressEvent {
        let mut channels = self.channels.lock().await;
        let channel = channels
            .entry(event.project_id)
            .or_insert_with(ProjectChannel::new);

        event.seq = channel.next_seq;
        channel.next_seq += 1;

        channel.backlog.push_back(event.clone());
        while channel.backlog.len() > self.backlog_size {
            channel.backlog.pop_front();
        }

        // Err means no live subscribers, which is fine.
        let _ = channel.tx.send(event.clone());
        event
    }

    /// A snapshot of the backlog plus a receiver for everything after it.
    pub async fn subscribe(
        &self,
        project_id: Uuid,
    ) -> (Vec<ProgressEvent>, broadcast::Receiver<ProgressEvent>) {
        let mut channels = self.channels.lock().await;
        let channel = channels
            .entry(project_id)
            .or_insert_with(ProjectChannel::new);
        let backlog: Vec<ProgressEvent> = channel.backlog.iter().cloned().collect();
        (backlog, channel.tx.subscribe())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn event(project: Uuid, kind: ProgressEventKind) -> ProgressEvent {
        let mut e = ProgressEvent::step_start(project, Uuid::new_v4(), Stage::BusinessAnalysis);
        e.kind = kind;
        e
    }

    #[tokio::test]
    async fn publish_assigns_per_project_sequences() {
        let broadcaster = ProgressBroadcaster::new(16);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let e0 = broadcaster.publish(event(a, ProgressEventKind::StepStart)).await;
        let e1 = broadcaster.publish(event(a, ProgressEventKind::StepComplete)).await;
        let f0 = broadcaster.publish(event(b, ProgressEventKind::StepStart)).await;

        assert_eq!(e0.seq, 0);
        assert_eq!(e1.seq, 1);
        assert_eq!(f0.seq, 0, "projects count independently");
    }

    #[tokio::test]
    async fn live_subscriber_sees_events_in_order() {
        let broadcaster = ProgressBroadcaster::new(16);
        let project = Uuid::new_v4();

        let (backlog, mut rx) = broadcaster.subscribe(project).await;
        assert!(backlog.is_empty());

        broadcaster.publish(event(project, ProgressEventKind::StepStart)).await;
        broadcaster.publish(event(project, ProgressEventKind::StepComplete)).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind, ProgressEventKind::StepStart);
        assert_eq!(second.kind, ProgressEventKind::StepComplete);
        assert!(first.seq < second.seq);
    }

    #[tokio::test]
    async fn late_subscriber_replays_backlog_then_live() {
        let broadcaster = ProgressBroadcaster::new(16);
        let project = Uuid::new_v4();

        broadcaster.publish(event(project, ProgressEventKind::StepStart)).await;
        broadcaster.publish(event(project, ProgressEventKind::StepComplete)).await;

        let (backlog, mut rx) = broadcaster.subscribe(project).await;
        assert_eq!(backlog.len(), 2);

        broadcaster.publish(event(project, ProgressEventKind::WorkflowComplete)).await;
        let live = rx.recv().await.unwrap();

        // Backlog and live stream join without a gap or duplicate.
        let seqs: Vec<u64> = backlog
            .iter()
            .map(|e| e.seq)
            .chain(std::iter::once(live.seq))
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn backlog_is_bounded() {
        let broadcaster = ProgressBroadcaster::new(3);
        let project = Uuid::new_v4();
        for _ in 0..5 {
            broadcaster.publish(event(project, ProgressEventKind::StepStart)).await;
        }

        let (backlog, _rx) = broadcaster.subscribe(project).await;
        assert_eq!(backlog.len(), 3);
        assert_eq!(backlog[0].seq, 2, "oldest events fall off");
        assert_eq!(backlog[2].seq, 4);
    }

    #[tokio::test]
    async fn fan_out_reaches_every_subscriber() {
        let broadcaster = ProgressBroadcaster::new(16);
        let project = Uuid::new_v4();

        let (_, mut rx1) = broadcaster.subscribe(project).await;
        let (_, mut rx2) = broadcaster.subscribe(project).await;

        broadcaster.publish(event(project, ProgressEventKind::StepStart)).await;

        assert_eq!(rx1.recv().await.unwrap().seq, 0);
        assert_eq!(rx2.recv().await.unwrap().seq, 0);
    }

    #[tokio::test]
    async fn other_projects_are_not_visible() {
        let broadcaster = ProgressBroadcaster::new(16);
        let project = Uuid::new_v4();
        let (_, mut rx) = broadcaster.subscribe(project).await;

        broadcaster
            .publish(event(Uuid::new_v4(), ProgressEventKind::StepStart))
            .await;
        broadcaster.publish(event(project, ProgressEventKind::StepError)).await;

        let got = rx.recv().await.unwrap();
        assert_eq!(got.project_id, project);
        assert_eq!(got.kind, ProgressEventKind::StepError);
    }
}
