use anyhow::Error;
use log::{error, info, warn};

use crate::delivery::{DeliveryError, RequestJob};
use crate::models::{MessageStatus, ResponseCode, StatusResponse};
use crate::store::MessageStore;

/// The transition a delivery outcome demands for a record in `Sending`.
#[derive(Debug, PartialEq)]
pub enum Transition {
    /// Accepted by the server; becomes `Sent` under the given remote id.
    Accepted(String),
    /// Refused by the server with the given code; becomes `NotAccepted`.
    Refused(u32),
    /// No usable outcome; becomes `Error`.
    Failed(DeliveryError),
}

/// Deterministic interpretation of a response list. Only the first
/// entry counts; everything after it is ignored.
pub fn interpret(responses: &[StatusResponse]) -> Transition {
    let Some(first) = responses.first() else {
        return Transition::Failed(DeliveryError::EmptyResponse);
    };
    match first.code {
        ResponseCode::Success => match first.remote_msg_id() {
            Some(remote_msg_id) => Transition::Accepted(remote_msg_id.to_string()),
            // Accepted but unidentifiable; the record must not sit in
            // Sending forever.
            None => Transition::Failed(DeliveryError::MissingMessageId),
        },
        ResponseCode::Failure(code) => Transition::Refused(code),
    }
}

/// Applies message center outcomes to submitted jobs' records.
///
/// Stateless apart from the store handle, so a single listener serves
/// any number of in-flight jobs without shared mutable state. Exactly
/// one of `response`/`error` runs per job, and each performs at most
/// one point update on the job's record.
#[derive(Clone)]
pub struct ResponseListener {
    store: MessageStore,
}

impl ResponseListener {
    pub fn new(store: MessageStore) -> Self {
        ResponseListener { store }
    }

    /// Success path: apply the first status response to the job's record.
    pub async fn response(&self, job: &RequestJob, responses: Vec<StatusResponse>) {
        match interpret(&responses) {
            Transition::Accepted(remote_msg_id) => {
                match self.store.mark_sent(job.record, &remote_msg_id).await {
                    Ok(n) => info!("message {} sent, record updated ({})", job.record, n),
                    Err(e) => error!("failed to update sent message {}: {}", job.record, e),
                }
            }
            Transition::Refused(code) => {
                match self.store.mark_status(job.record, MessageStatus::NotAccepted).await {
                    Ok(n) => warn!(
                        "server refused message {} with code {}, record updated ({})",
                        job.record, code, n
                    ),
                    Err(e) => error!("failed to update refused message {}: {}", job.record, e),
                }
            }
            Transition::Failed(e) => self.error(job, e.into()).await,
        }
    }

    /// Failure path: the delivery attempt is over, mark the record failed.
    pub async fn error(&self, job: &RequestJob, err: Error) {
        if let Err(e) = self.store.mark_status(job.record, MessageStatus::Error).await {
            error!("failed to update message {} after delivery error: {}", job.record, e);
        }
        error!("error sending message {}: {}", job.record, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_with_remote_id_is_accepted() {
        let transition = interpret(&[StatusResponse::success("abc123")]);
        assert_eq!(transition, Transition::Accepted("abc123".to_string()));
    }

    #[test]
    fn success_without_remote_id_fails() {
        let bare = StatusResponse {
            code: ResponseCode::Success,
            extra: None,
        };
        assert_eq!(
            interpret(&[bare]),
            Transition::Failed(DeliveryError::MissingMessageId)
        );
        assert_eq!(
            interpret(&[StatusResponse::success("")]),
            Transition::Failed(DeliveryError::MissingMessageId)
        );
    }

    #[test]
    fn any_failure_code_is_refused() {
        for code in [1u32, 406, 99999] {
            assert_eq!(
                interpret(&[StatusResponse::failure(code)]),
                Transition::Refused(code)
            );
        }
    }

    #[test]
    fn empty_list_fails() {
        assert_eq!(
            interpret(&[]),
            Transition::Failed(DeliveryError::EmptyResponse)
        );
    }

    #[test]
    fn only_the_first_response_counts() {
        let transition = interpret(&[
            StatusResponse::failure(500),
            StatusResponse::success("ignored"),
        ]);
        assert_eq!(transition, Transition::Refused(500));
    }
}
