//! Serialized processing of scanned payloads
//!
//! The capture loop hands payloads to [`ProcessingQueue::submit`] and moves
//! on. A single spawned task owns the [`Session`] and drains the queue in
//! arrival order, so the session is never touched from two places at once.
//! Outcomes are reported on an event channel.

use crate::error::FrameError;
use crate::session::{FileMetadata, ReceivedFile, ScanReport, Session};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[cfg(feature = "logging")]
use tracing::debug;

/// Something the worker reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// The header was decoded
    Metadata(FileMetadata),

    /// A payload was processed
    Processed {
        /// What happened
        report: ScanReport,
        /// Payloads still queued behind it
        pending: usize,
    },

    /// A payload was rejected without changing the session
    Rejected {
        /// Why
        error: FrameError,
        /// Payloads still queued behind it
        pending: usize,
    },

    /// A file was completed; sent once per distinct hash
    Completed(ReceivedFile),
}

/// What [`ProcessingQueue::submit`] did with a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Queued for processing
    Queued,
    /// Same as the previous payload, dropped
    Duplicate,
    /// The worker is gone
    Closed,
}

enum Command {
    Scan(Bytes),
    Reset,
}

/// Producer side of the receiver's processing queue
pub struct ProcessingQueue {
    tx: mpsc::UnboundedSender<Command>,
    last: Option<Bytes>,
    worker: JoinHandle<Session>,
}

impl ProcessingQueue {
    /// Start a worker with a fresh session
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn() -> (Self, mpsc::UnboundedReceiver<ReceiverEvent>) {
        Self::with_session(Session::new())
    }

    /// Start a worker that takes ownership of `session`
    pub fn with_session(session: Session) -> (Self, mpsc::UnboundedReceiver<ReceiverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(session, rx, event_tx));

        (
            Self {
                tx,
                last: None,
                worker,
            },
            event_rx,
        )
    }

    /// Queue a scanned payload
    ///
    /// A payload identical to the one submitted just before is dropped: the
    /// same code is usually still in view of the camera.
    pub fn submit(&mut self, payload: impl Into<Bytes>) -> Submission {
        let payload = payload.into();
        if self.last.as_ref() == Some(&payload) {
            return Submission::Duplicate;
        }

        self.last = Some(payload.clone());
        match self.tx.send(Command::Scan(payload)) {
            Ok(()) => Submission::Queued,
            Err(_) => Submission::Closed,
        }
    }

    /// Queue a session reset, ordered after the payloads already submitted
    pub fn reset(&mut self) -> Submission {
        self.last = None;
        match self.tx.send(Command::Reset) {
            Ok(()) => Submission::Queued,
            Err(_) => Submission::Closed,
        }
    }

    /// Process everything queued so far, stop the worker and return the session
    pub async fn shutdown(self) -> Result<Session, FrameError> {
        drop(self.tx);
        self.worker
            .await
            .map_err(|e| FrameError::WorkerStopped(e.to_string()))
    }
}

async fn run_worker(
    mut session: Session,
    mut rx: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ReceiverEvent>,
) -> Session {
    // Event delivery is best effort: nobody listening is not an error
    while let Some(command) = rx.recv().await {
        let payload = match command {
            Command::Scan(payload) => payload,
            Command::Reset => {
                session.reset();
                continue;
            }
        };

        let pending = rx.len();
        match session.on_scan(&payload) {
            Ok(report) => {
                if let Some(metadata) = &report.metadata {
                    let _ = events.send(ReceiverEvent::Metadata(metadata.clone()));
                }
                let completed = report.completed.clone();

                let _ = events.send(ReceiverEvent::Processed { report, pending });
                if let Some(file) = completed {
                    let _ = events.send(ReceiverEvent::Completed(file));
                }
            }
            Err(error) => {
                #[cfg(feature = "logging")]
                debug!("Rejected payload of {} bytes: {}", payload.len(), error);

                let _ = events.send(ReceiverEvent::Rejected { error, pending });
            }
        }
    }

    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::ContentBuilder;

    #[tokio::test]
    async fn test_consecutive_duplicates_dropped() {
        let (mut queue, _events) = ProcessingQueue::spawn();

        assert_eq!(queue.submit(&b"11013abc"[..]), Submission::Queued);
        assert_eq!(queue.submit(&b"11013abc"[..]), Submission::Duplicate);
        assert_eq!(queue.submit(&b"11113def"[..]), Submission::Queued);
        assert_eq!(queue.submit(&b"11013abc"[..]), Submission::Queued);

        let session = queue.shutdown().await.unwrap();
        assert_eq!(session.store().len(), 2);
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let frames = ContentBuilder::new("x.bin")
            .payload(&b"queued payload"[..])
            .data_capacity(500)
            .build()
            .unwrap();

        let (mut queue, mut events) = ProcessingQueue::spawn();
        queue.submit(&b"bogus"[..]);
        queue.submit(frames.frames()[0].clone());
        let session = queue.shutdown().await.unwrap();

        assert!(matches!(
            events.recv().await,
            Some(ReceiverEvent::Rejected { .. })
        ));
        assert!(matches!(events.recv().await, Some(ReceiverEvent::Metadata(_))));
        assert!(matches!(
            events.recv().await,
            Some(ReceiverEvent::Processed { .. })
        ));
        match events.recv().await {
            Some(ReceiverEvent::Completed(file)) => {
                assert_eq!(&file.payload[..], b"queued payload")
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert!(events.recv().await.is_none());
        assert!(session.hash_saved().is_some());
    }

    #[tokio::test]
    async fn test_reset_is_ordered() {
        let (mut queue, _events) = ProcessingQueue::spawn();
        queue.submit(&b"11013abc"[..]);
        assert_eq!(queue.reset(), Submission::Queued);
        queue.submit(&b"11113def"[..]);

        let session = queue.shutdown().await.unwrap();
        assert_eq!(session.store().len(), 1);
        assert!(session.store().contains(1));
    }
}
