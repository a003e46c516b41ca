use crate::delivery::ResponseListener;
use crate::models::RecordId;

/// An immutable description of one outbound delivery attempt.
///
/// Built at send time, owned by exactly one `ServiceConnection`, and
/// discarded once its listener has fired. A job is never reused across
/// connections; the listener handle it carries is the single channel
/// through which its outcome is reported.
#[derive(Clone)]
pub struct RequestJob {
    pub peer: String,
    pub content: String,
    /// The persisted record this attempt belongs to.
    pub record: RecordId,
    pub listener: ResponseListener,
}

impl RequestJob {
    pub fn new(peer: &str, content: &str, record: RecordId, listener: ResponseListener) -> Self {
        RequestJob {
            peer: peer.to_string(),
            content: content.to_string(),
            record,
            listener,
        }
    }
}
