//! Cancellable hand-off into the downstream message queue.

use sync_core::SyncMessage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why a message was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    Closed,
    Cancelled,
}

/// Shared sender for every task of a run.
///
/// A send waits for queue capacity and gives up as soon as the run is
/// cancelled.
#[derive(Debug, Clone)]
pub struct MessageSink {
    tx: mpsc::Sender<SyncMessage>,
    cancel: CancellationToken,
}

impl MessageSink {
    pub fn new(tx: mpsc::Sender<SyncMessage>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    pub async fn send(&self, message: SyncMessage) -> Result<(), SendError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SendError::Cancelled),
            sent = self.tx.send(message) => sent.map_err(|_| SendError::Closed),
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use sync_core::TableDefinition;

    fn announce() -> SyncMessage {
        SyncMessage::MigrateTable {
            table: Arc::new(TableDefinition::new("t", vec![])),
        }
    }

    #[tokio::test]
    async fn test_send_delivers() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = MessageSink::new(tx, CancellationToken::new());
        tokio_test::assert_ok!(sink.send(announce()).await);
        assert_eq!(rx.recv().await.unwrap().table_name(), "t");
    }

    #[tokio::test]
    async fn test_send_to_closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = MessageSink::new(tx, CancellationToken::new());
        assert_eq!(sink.send(announce()).await, Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_cancel_unblocks_full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let sink = MessageSink::new(tx, cancel.clone());
        sink.send(announce()).await.unwrap();

        let blocked = tokio::spawn({
            let sink = sink.clone();
            async move { sink.send(announce()).await }
        });
        cancel.cancel();
        assert_eq!(blocked.await.unwrap(), Err(SendError::Cancelled));
    }
}
