// src/realtime.rs

//! Live query subscriptions.
//!
//! A [`Subscription`] re-runs one query whenever its collection changes and publishes
//! the new result over a `watch` channel. Each subscription owns a
//! [`CancellationToken`]; cancelling it or dropping the handle stops the refresh task.

use tokio::sync::{broadcast::error::RecvError, watch};
use tokio_util::sync::CancellationToken;

use crate::store::{Document, Filter, Store, StoreError};

pub struct Subscription<T> {
    receiver: watch::Receiver<Vec<T>>,
    cancel: CancellationToken,
}

impl<T: Clone> Subscription<T> {
    /// The latest snapshot.
    pub fn current(&self) -> Vec<T> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next snapshot. Returns `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// A receiver sharing this subscription's snapshots.
    pub fn receiver(&self) -> watch::Receiver<Vec<T>> {
        self.receiver.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Subscribes to the documents of `T` matching `filters`.
///
/// The initial snapshot is loaded before this returns, so a failing query surfaces
/// here rather than silently in the background.
pub async fn watch_query<T>(store: &Store, filters: Vec<Filter>) -> Result<Subscription<T>, StoreError>
where
    T: Document + PartialEq,
{
    // Listen before the first read so no write slips between the two.
    let mut changes = store.subscribe_changes();
    let initial: Vec<T> = store.find(&filters).await?;

    let (tx, receiver) = watch::channel(initial);
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let store = store.clone();
    let collection = T::COLLECTION;

    tokio::spawn(async move {
        loop {
            let refresh = tokio::select! {
                _ = token.cancelled() => break,
                _ = tx.closed() => break,
                event = changes.recv() => match event {
                    Ok(event) => event.collection == collection,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(collection = %collection, skipped, "Subscription lagged, refreshing");
                        true
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            if !refresh {
                continue;
            }

            match store.find::<T>(&filters).await {
                Ok(docs) => {
                    tx.send_if_modified(|current| {
                        if *current == docs {
                            false
                        } else {
                            *current = docs;
                            true
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(collection = %collection, "Subscription refresh failed: {}", e);
                }
            }
        }
        tracing::debug!(collection = %collection, "Subscription ended");
    });

    Ok(Subscription { receiver, cancel })
}
