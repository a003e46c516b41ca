// Common test utilities for integration tests
// This module contains the scripted message center double and helpers
// shared by the delivery and query suites.

#![allow(dead_code)] // not every suite uses every helper

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::{sleep, Duration, Instant};

use courier::delivery::{DeliveryError, DeliveryService, DeliverySession};
use courier::models::{
    Direction, MessageRecord, MessageStatus, NewMessage, RecordId, StatusResponse,
};
use courier::store::MessageStore;
use courier::RequestJob;

/// What the scripted center does with a submitted job.
#[derive(Clone)]
pub enum Script {
    /// Report the given status responses shortly after submission.
    Respond(Vec<StatusResponse>),
    /// Refuse to hand out a session at all.
    RefuseBind,
    /// Accept the job and never report an outcome.
    Swallow,
}

/// Counters and observations shared between a center and its sessions.
#[derive(Default)]
pub struct CenterObservations {
    pub binds: AtomicUsize,
    pub submissions: AtomicUsize,
    /// Store snapshot of each job's record taken at submission time.
    pub at_submit: Mutex<Vec<MessageRecord>>,
}

/// Deterministic in-process message center double.
pub struct ScriptedCenter {
    script: Script,
    store: Option<MessageStore>,
    observations: Arc<CenterObservations>,
}

impl ScriptedCenter {
    pub fn new(script: Script) -> Self {
        ScriptedCenter {
            script,
            store: None,
            observations: Arc::new(CenterObservations::default()),
        }
    }

    /// Like `new`, but sessions snapshot each job's record from the
    /// store at submission time.
    pub fn with_store(script: Script, store: MessageStore) -> Self {
        ScriptedCenter {
            script,
            store: Some(store),
            observations: Arc::new(CenterObservations::default()),
        }
    }

    pub fn observations(&self) -> Arc<CenterObservations> {
        self.observations.clone()
    }
}

#[async_trait]
impl DeliveryService for ScriptedCenter {
    async fn bind(&self) -> Result<Box<dyn DeliverySession>, DeliveryError> {
        if matches!(self.script, Script::RefuseBind) {
            return Err(DeliveryError::BindFailed("message center not running".to_string()));
        }
        self.observations.binds.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            store: self.store.clone(),
            observations: self.observations.clone(),
        }))
    }
}

struct ScriptedSession {
    script: Script,
    store: Option<MessageStore>,
    observations: Arc<CenterObservations>,
}

#[async_trait]
impl DeliverySession for ScriptedSession {
    async fn submit(&mut self, job: RequestJob) -> Result<(), DeliveryError> {
        self.observations.submissions.fetch_add(1, Ordering::SeqCst);
        if let Some(store) = &self.store {
            if let Ok(Some(record)) = store.message(job.record).await {
                self.observations.at_submit.lock().unwrap().push(record);
            }
        }
        if let Script::Respond(responses) = &self.script {
            let responses = responses.clone();
            // The outcome arrives later, off the submission path.
            tokio::spawn(async move {
                sleep(Duration::from_millis(10)).await;
                job.listener.response(&job, responses).await;
            });
        }
        Ok(())
    }

    async fn unbind(self: Box<Self>) {}
}

/// Insert an outbound record in `Sending`, the way a compose does.
pub async fn insert_sending(store: &MessageStore, peer: &str, content: &str) -> RecordId {
    store
        .insert(NewMessage {
            msg_id: format!("draft-test-{}", content.len()),
            peer: peer.to_string(),
            mime: "text/plain".to_string(),
            content: content.to_string(),
            direction: Direction::Outbound,
            status: MessageStatus::Sending,
            unread: false,
            timestamp: 1_000,
        })
        .await
        .expect("insert failed")
}

/// Poll the store until the record reaches a terminal status.
pub async fn wait_for_terminal(store: &MessageStore, id: RecordId) -> MessageRecord {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(record) = store.message(id).await.expect("store read failed") {
            if record.status.is_terminal() {
                return record;
            }
        }
        assert!(
            Instant::now() < deadline,
            "record {} never reached a terminal status",
            id
        );
        sleep(Duration::from_millis(5)).await;
    }
}
