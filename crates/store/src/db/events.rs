//! Write notifications behind the live query streams.
//!
//! Every committed write notifies the tables it touched. A live query
//! subscribes to the notifier, emits one initial snapshot, then re-runs its
//! query after each notification for a table in its dependency set. Joins
//! list every joined table, so e.g. a cart stream refreshes on product
//! edits too. Notifications carry no payload; subscribers always re-read
//! the full result set, so a lagged receiver just coalesces missed writes
//! into a single refresh.

use std::future::Future;

use futures::stream::{self, BoxStream};
use tokio::sync::broadcast::{self, error::RecvError};

use super::StoreError;

/// Capacity of the broadcast channel; past this, slow subscribers lag and
/// coalesce.
const CHANNEL_CAPACITY: usize = 64;

/// Tables a write can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Categories,
    Products,
    Users,
    Addresses,
    CartItems,
    Orders,
    Settings,
}

/// Broadcast fan-out of committed writes.
///
/// Held by the [`Store`](super::Store); dropping the store closes the
/// channel and ends every live query stream.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<Table>,
}

impl ChangeNotifier {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Announce a committed write. Must only be called after the
    /// transaction (or single statement) has committed.
    pub(crate) fn notify(&self, table: Table) {
        // send only fails when there are no subscribers, which is fine
        let _ = self.tx.send(table);
    }

    fn subscribe(&self) -> broadcast::Receiver<Table> {
        self.tx.subscribe()
    }
}

/// Build a live query stream: an initial snapshot, then a fresh snapshot
/// after every committed write to one of `tables`.
///
/// The stream is infinite while the store lives, ends when the store is
/// dropped, and is cancelled without side effects by dropping it.
pub(crate) fn live<T, F, Fut>(
    notifier: &ChangeNotifier,
    tables: &'static [Table],
    query: F,
) -> BoxStream<'static, Result<T, StoreError>>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, StoreError>> + Send,
{
    let rx = notifier.subscribe();

    Box::pin(stream::unfold(
        (rx, query, true),
        move |(mut rx, query, initial)| async move {
            if !initial {
                loop {
                    match rx.recv().await {
                        Ok(table) if tables.contains(&table) => break,
                        Ok(_) => {}
                        Err(RecvError::Lagged(_)) => break,
                        Err(RecvError::Closed) => return None,
                    }
                }
            }

            let item = query().await;
            Some((item, (rx, query, false)))
        },
    ))
}
