// Client-side message delivery core.
//
// Composing a message persists it durably before any network activity;
// a one-shot service connection dispatches it to the message center,
// and the response listener reconciles the persisted record with the
// asynchronous outcome. Thread queries are non-blocking and token-tagged.

pub mod composer;
pub mod delivery;
pub mod models;
pub mod peer;
pub mod query;
pub mod store;

// Re-export the main types for convenience
pub use composer::Composer;
pub use delivery::{
    DeliveryError, DeliveryService, DeliverySession, RequestJob, ResponseListener,
    ServiceConnection,
};
pub use models::*;
pub use query::{QueryComplete, ThreadQueryHandler};
pub use store::{MessageStore, StoreEvent};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(!MessageStatus::Sending.is_terminal());
        assert!(MessageStatus::Sent.is_terminal());
        assert!(MessageStatus::NotAccepted.is_terminal());
        assert!(MessageStatus::Error.is_terminal());
    }

    #[test]
    fn test_status_round_trip_through_store_codes() {
        for status in [
            MessageStatus::Sending,
            MessageStatus::Sent,
            MessageStatus::NotAccepted,
            MessageStatus::Error,
        ] {
            assert_eq!(MessageStatus::from_i64(status as i64), Some(status));
        }
        assert_eq!(MessageStatus::from_i64(0), None);
        assert_eq!(MessageStatus::from_i64(99), None);
    }

    #[test]
    fn test_status_response_remote_id_extraction() {
        let accepted = StatusResponse::success("abc123");
        assert_eq!(accepted.code, ResponseCode::Success);
        assert_eq!(accepted.remote_msg_id(), Some("abc123"));

        let refused = StatusResponse::failure(406);
        assert_eq!(refused.code, ResponseCode::Failure(406));
        assert_eq!(refused.remote_msg_id(), None);

        // A success without extra data, or with an empty id, carries
        // nothing usable.
        let bare = StatusResponse {
            code: ResponseCode::Success,
            extra: None,
        };
        assert_eq!(bare.remote_msg_id(), None);
        let empty = StatusResponse::success("");
        assert_eq!(empty.remote_msg_id(), None);
    }

    #[test]
    fn test_record_id_display() {
        assert_eq!(RecordId(42).to_string(), "messages/42");
    }
}
