// PCAP Funnel - Batched Ingestion
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Progressive loading of a dataset delivered in batches.
//!
//! A converter splits a large capture into parts and sends each part as soon
//! as it is parsed. The first part replaces the session dataset, later parts
//! are appended. Only messages of the current request are applied; anything
//! else (a superseded request, or batches arriving after a cancel) is
//! discarded.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::{into_dataset, Packet};
use crate::session::Session;

/// Whether a batch starts a dataset or extends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchKind {
    NewDataset,
    Batch,
}

/// One part of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMessage {
    pub request_id: u64,
    pub kind: BatchKind,
    /// Progress label, `"<i> / <n>"`.
    pub batch: String,
    pub last_batch: bool,
    pub packets: Vec<Packet>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// Start loading `name`, superseding any load in flight.
    Request { name: String },
    Batch(BatchMessage),
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum IngestState {
    #[default]
    Idle,
    Requested { request_id: u64, name: String },
    Receiving { request_id: u64, name: String, batch: String },
    Complete { request_id: u64, name: String },
    Cancelled { request_id: u64 },
}

/// What handling an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Requested(u64),
    Replaced,
    Appended,
    Cancelled,
    Discarded,
}

/// Ingestion state machine.
#[derive(Debug, Default)]
pub struct Ingest {
    state: IngestState,
    last_request_id: u64,
}

impl Ingest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &IngestState {
        &self.state
    }

    /// Request id batches must carry to be applied.
    pub fn accepting(&self) -> Option<u64> {
        match self.state {
            IngestState::Requested { request_id, .. }
            | IngestState::Receiving { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Progress label of the last applied batch.
    pub fn progress(&self) -> Option<&str> {
        match &self.state {
            IngestState::Receiving { batch, .. } => Some(batch),
            _ => None,
        }
    }

    pub fn handle(&mut self, event: IngestEvent, session: &mut Session) -> IngestOutcome {
        match event {
            IngestEvent::Request { name } => {
                self.last_request_id += 1;
                let request_id = self.last_request_id;
                info!("Requesting dataset {} (request {})", name, request_id);
                self.state = IngestState::Requested { request_id, name };
                IngestOutcome::Requested(request_id)
            }
            IngestEvent::Cancel => match self.accepting() {
                Some(request_id) => {
                    info!("Cancelled request {}", request_id);
                    self.state = IngestState::Cancelled { request_id };
                    IngestOutcome::Cancelled
                }
                None => {
                    debug!("Nothing to cancel");
                    IngestOutcome::Discarded
                }
            },
            IngestEvent::Batch(message) => self.apply(message, session),
        }
    }

    fn apply(&mut self, message: BatchMessage, session: &mut Session) -> IngestOutcome {
        let name = match &self.state {
            IngestState::Requested { request_id, name } if *request_id == message.request_id => {
                if message.kind != BatchKind::NewDataset {
                    warn!(
                        "Discarding batch {} of request {}: expected a new dataset first",
                        message.batch, message.request_id
                    );
                    return IngestOutcome::Discarded;
                }
                name.clone()
            }
            IngestState::Receiving { request_id, name, .. }
                if *request_id == message.request_id =>
            {
                name.clone()
            }
            _ => {
                warn!(
                    "Discarding batch {} of stale request {}",
                    message.batch, message.request_id
                );
                return IngestOutcome::Discarded;
            }
        };

        debug!(
            "Batch {} of {}: {} packets",
            message.batch,
            name,
            message.packets.len()
        );
        let packets = into_dataset(message.packets);
        let outcome = match message.kind {
            BatchKind::NewDataset => {
                session.change_dataset(packets);
                IngestOutcome::Replaced
            }
            BatchKind::Batch => {
                session.append_to_dataset(packets);
                IngestOutcome::Appended
            }
        };

        self.state = if message.last_batch {
            info!("Finished loading {}", name);
            IngestState::Complete {
                request_id: message.request_id,
                name,
            }
        } else {
            IngestState::Receiving {
                request_id: message.request_id,
                name,
                batch: message.batch,
            }
        };
        outcome
    }

    /// Apply events from `events` until the channel closes or the load ends.
    pub async fn run(&mut self, events: &mut mpsc::Receiver<IngestEvent>, session: &mut Session) {
        while let Some(event) = events.recv().await {
            self.handle(event, session);
            if matches!(
                self.state,
                IngestState::Complete { .. } | IngestState::Cancelled { .. }
            ) {
                break;
            }
        }
    }
}

/// Split `packets` into batch messages of at most `batch_size` packets.
///
/// An empty dataset still yields one (empty, last) message.
pub fn split_into_batches(
    request_id: u64,
    packets: Vec<Packet>,
    batch_size: usize,
) -> Vec<BatchMessage> {
    let batch_size = batch_size.max(1);
    let total = packets.len().div_ceil(batch_size).max(1);

    let mut messages = Vec::with_capacity(total);
    let mut packets = packets.into_iter();
    for index in 0..total {
        let chunk: Vec<Packet> = packets.by_ref().take(batch_size).collect();
        messages.push(BatchMessage {
            request_id,
            kind: if index == 0 {
                BatchKind::NewDataset
            } else {
                BatchKind::Batch
            },
            batch: format!("{} / {}", index + 1, total),
            last_batch: index + 1 == total,
            packets: chunk,
        });
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packets(count: u64) -> Vec<Packet> {
        (0..count)
            .map(|i| Packet::new(i, i as f64, "10.0.0.1", "10.0.0.2").with_bytes(60))
            .collect()
    }

    #[test]
    fn test_split_into_batches() {
        let messages = split_into_batches(3, packets(5), 2);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].kind, BatchKind::NewDataset);
        assert_eq!(messages[1].kind, BatchKind::Batch);
        assert_eq!(messages[2].batch, "3 / 3");
        assert!(messages[2].last_batch && !messages[1].last_batch);
        assert_eq!(messages[2].packets.len(), 1);
        assert!(messages.iter().all(|m| m.request_id == 3));

        let empty = split_into_batches(1, Vec::new(), 10);
        assert_eq!(empty.len(), 1);
        assert!(empty[0].last_batch);
    }

    #[test]
    fn test_full_load() {
        let mut ingest = Ingest::new();
        let mut session = Session::default();

        let IngestOutcome::Requested(id) = ingest.handle(
            IngestEvent::Request {
                name: "capture".into(),
            },
            &mut session,
        ) else {
            panic!("request not started");
        };

        let mut outcomes = Vec::new();
        for message in split_into_batches(id, packets(5), 2) {
            outcomes.push(ingest.handle(IngestEvent::Batch(message), &mut session));
            if !matches!(ingest.state(), IngestState::Complete { .. }) {
                assert!(ingest.progress().is_some());
            }
        }

        assert_eq!(
            outcomes,
            vec![
                IngestOutcome::Replaced,
                IngestOutcome::Appended,
                IngestOutcome::Appended
            ]
        );
        assert_eq!(session.dataset().len(), 5);
        assert!(matches!(ingest.state(), IngestState::Complete { .. }));
    }

    #[test]
    fn test_new_request_supersedes_old() {
        let mut ingest = Ingest::new();
        let mut session = Session::default();

        ingest.handle(IngestEvent::Request { name: "a".into() }, &mut session);
        let old = split_into_batches(1, packets(4), 2);
        ingest.handle(IngestEvent::Batch(old[0].clone()), &mut session);

        ingest.handle(IngestEvent::Request { name: "b".into() }, &mut session);
        assert_eq!(ingest.accepting(), Some(2));

        let outcome = ingest.handle(IngestEvent::Batch(old[1].clone()), &mut session);
        assert_eq!(outcome, IngestOutcome::Discarded);
        assert_eq!(session.dataset().len(), 2);
    }

    #[test]
    fn test_batches_after_cancel_are_discarded() {
        let mut ingest = Ingest::new();
        let mut session = Session::default();

        ingest.handle(IngestEvent::Request { name: "a".into() }, &mut session);
        let messages = split_into_batches(1, packets(4), 2);
        ingest.handle(IngestEvent::Batch(messages[0].clone()), &mut session);
        assert_eq!(ingest.handle(IngestEvent::Cancel, &mut session), IngestOutcome::Cancelled);

        let outcome = ingest.handle(IngestEvent::Batch(messages[1].clone()), &mut session);
        assert_eq!(outcome, IngestOutcome::Discarded);
        assert_eq!(session.dataset().len(), 2);
        assert_eq!(ingest.handle(IngestEvent::Cancel, &mut session), IngestOutcome::Discarded);
    }

    #[test]
    fn test_append_before_new_dataset_is_discarded() {
        let mut ingest = Ingest::new();
        let mut session = Session::default();
        ingest.handle(IngestEvent::Request { name: "a".into() }, &mut session);

        let messages = split_into_batches(1, packets(4), 2);
        let outcome = ingest.handle(IngestEvent::Batch(messages[1].clone()), &mut session);
        assert_eq!(outcome, IngestOutcome::Discarded);
        assert!(matches!(ingest.state(), IngestState::Requested { .. }));
    }

    #[tokio::test]
    async fn test_run_drains_channel_until_complete() {
        let (sender, mut receiver) = mpsc::channel(8);
        let mut ingest = Ingest::new();
        let mut session = Session::default();

        sender
            .send(IngestEvent::Request { name: "a".into() })
            .await
            .unwrap();
        for message in split_into_batches(1, packets(3), 1) {
            sender.send(IngestEvent::Batch(message)).await.unwrap();
        }

        ingest.run(&mut receiver, &mut session).await;
        assert_eq!(session.dataset().len(), 3);
        assert!(matches!(ingest.state(), IngestState::Complete { .. }));
    }
}
