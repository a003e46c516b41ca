// Compose flow: persist first, then dispatch.
//
// A composed message is durable in the store, in `Sending`, before any
// session work starts. Delivery outcomes never come back through this
// module; they land in the store via the response listener, and the
// presentation layer observes them through change notifications.

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::info;
use std::sync::Arc;

use crate::delivery::{DeliveryService, RequestJob, ResponseListener, ServiceConnection};
use crate::models::{Direction, MessageStatus, NewMessage, RecordId};
use crate::store::MessageStore;

pub struct Composer {
    store: MessageStore,
    service: Arc<dyn DeliveryService>,
    listener: ResponseListener,
}

impl Composer {
    pub fn new(store: MessageStore, service: Arc<dyn DeliveryService>) -> Self {
        let listener = ResponseListener::new(store.clone());
        Composer {
            store,
            service,
            listener,
        }
    }

    /// Persist an outgoing message and dispatch it to the message center.
    ///
    /// Returns the new record's id together with the thread the store
    /// filed it under, without waiting for delivery. An insert failure
    /// propagates before any job exists, so the caller can keep the
    /// draft text and retry.
    pub async fn send_message(&self, peer: &str, text: &str) -> Result<(RecordId, i64)> {
        // Placeholder id until the server assigns one.
        let msg_id = format!("draft{}", rand::random::<u32>());

        let record = self
            .store
            .insert(NewMessage {
                msg_id,
                peer: peer.to_string(),
                mime: "text/plain".to_string(),
                content: text.to_string(),
                direction: Direction::Outbound,
                status: MessageStatus::Sending,
                unread: false,
                timestamp: Utc::now().timestamp_millis(),
            })
            .await?;

        // Read the record back to learn its resolved thread.
        let thread_id = self
            .store
            .message(record)
            .await?
            .ok_or_else(|| anyhow!("record {} not readable after insert", record))?
            .thread_id;

        info!("sending message {} to {}", record, peer);
        let job = RequestJob::new(peer, text, record, self.listener.clone());
        let mut connection = ServiceConnection::new(self.service.clone(), job);
        tokio::spawn(async move {
            connection.connect().await;
        });

        Ok((record, thread_id))
    }
}
