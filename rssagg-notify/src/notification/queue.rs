//! Bounded dispatch queue for request-path notifications.
//!
//! Request handlers enqueue and return; one worker drains the queue through the
//! dispatcher. The channel capacity bounds memory under load and is the
//! backpressure point.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatcher::NotificationDispatcher;
use super::events::NotificationRequest;
use crate::{Error, Result};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Sending side of the dispatch queue. Cheap to clone.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<NotificationRequest>,
}

impl DispatchQueue {
    /// Spawn the worker and return the queue handle plus the worker's join handle.
    ///
    /// On cancellation the worker stops accepting new requests, dispatches what
    /// is already buffered, then exits.
    pub fn start(
        dispatcher: Arc<NotificationDispatcher>,
        capacity: usize,
        cancellation: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(dispatcher, rx, cancellation));
        (Self { tx }, handle)
    }

    /// Enqueue, waiting for capacity when the queue is full.
    pub async fn enqueue(&self, request: NotificationRequest) -> Result<()> {
        self.tx.send(request).await.map_err(|_| Error::QueueClosed)
    }

    /// Enqueue without waiting.
    pub fn try_enqueue(&self, request: NotificationRequest) -> Result<()> {
        self.tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => Error::upstream("dispatch queue is full"),
            TrySendError::Closed(_) => Error::QueueClosed,
        })
    }

    /// Free slots left in the queue.
    pub fn remaining_capacity(&self) -> usize {
        self.tx.capacity()
    }
}

async fn run_worker(
    dispatcher: Arc<NotificationDispatcher>,
    mut rx: mpsc::Receiver<NotificationRequest>,
    cancellation: CancellationToken,
) {
    info!("Notification dispatch worker started");

    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            request = rx.recv() => match request {
                Some(request) => dispatch_one(&dispatcher, request).await,
                None => break,
            },
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Some(request) = rx.recv().await {
        dispatch_one(&dispatcher, request).await;
        drained += 1;
    }

    info!(drained, "Notification dispatch worker stopped");
}

async fn dispatch_one(dispatcher: &NotificationDispatcher, request: NotificationRequest) {
    let user_id = request.user_id.clone();
    let kind = request.kind.clone();
    match dispatcher.notify(request).await {
        Ok(dispatched) => debug!(
            notification_id = %dispatched.notification.id,
            user_id = %user_id,
            is_new = dispatched.is_new,
            "Queued notification dispatched"
        ),
        Err(e) => warn!(
            user_id = %user_id,
            kind = %kind,
            error = %e,
            "Queued notification failed"
        ),
    }
}
