// Non-blocking thread queries for the presentation layer.

use anyhow::Result;
use log::{debug, error};
use tokio::sync::mpsc;

use crate::models::MessageRecord;
use crate::store::MessageStore;

/// Completion of one thread query, tagged with the caller's token so
/// that stale or duplicate in-flight queries can be told apart.
pub struct QueryComplete {
    pub token: u32,
    pub thread_id: i64,
    pub result: Result<Vec<MessageRecord>>,
}

/// Issues reads of a conversation's records without ever blocking the
/// caller. Results, including store errors, arrive as `QueryComplete`
/// events on the receiver handed out at construction.
pub struct ThreadQueryHandler {
    store: MessageStore,
    completions: mpsc::Sender<QueryComplete>,
}

impl ThreadQueryHandler {
    pub fn new(store: MessageStore) -> (Self, mpsc::Receiver<QueryComplete>) {
        let (completions, rx) = mpsc::channel(16);
        (ThreadQueryHandler { store, completions }, rx)
    }

    /// Start a query for a thread's records in conversation order.
    ///
    /// Returns immediately. A failed read is delivered as an `Err`
    /// completion under the same token; the handler stays usable.
    pub fn start_query(&self, token: u32, thread_id: i64) {
        debug!("starting query {} for thread {}", token, thread_id);
        let store = self.store.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = store.thread_messages(thread_id).await;
            if let Err(e) = &result {
                error!("query {} for thread {} failed: {}", token, thread_id, e);
            }
            let complete = QueryComplete {
                token,
                thread_id,
                result,
            };
            if completions.send(complete).await.is_err() {
                debug!("query {} completed after its receiver was dropped", token);
            }
        });
    }
}
