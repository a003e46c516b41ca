// Delivery pipeline for outbound messages
// This module is the boundary to the message center: the long-lived
// process that actually transmits messages and reports their outcome.

use async_trait::async_trait;
use thiserror::Error;

pub mod connection;
pub mod job;
pub mod listener;

pub use connection::ServiceConnection;
pub use job::RequestJob;
pub use listener::{interpret, ResponseListener, Transition};

/// Errors on the delivery path. All of them are terminal for the job
/// they occur on and end up as an `Error` status on the record.
#[derive(Debug, Error, PartialEq)]
pub enum DeliveryError {
    /// No session with the message center could be obtained.
    #[error("unable to bind to the message center: {0}")]
    BindFailed(String),

    /// The center reported no status response at all.
    #[error("empty response")]
    EmptyResponse,

    /// The center reported success but carried no server message id.
    #[error("accepted without a message id")]
    MissingMessageId,

    /// The session was lost before the job could be handed over.
    #[error("submission failed: {0}")]
    SubmitFailed(String),
}

/// The message center as seen from this client.
///
/// Implementations hand out one session per `bind` call; everything a
/// session learns about a job's fate is reported through the job's own
/// listener, never through these methods.
#[async_trait]
pub trait DeliveryService: Send + Sync {
    async fn bind(&self) -> Result<Box<dyn DeliverySession>, DeliveryError>;
}

/// A live session with the message center.
#[async_trait]
pub trait DeliverySession: Send {
    /// Hand the job over for transmission. An `Err` here means the
    /// hand-over itself failed; the delivery outcome always arrives
    /// later via the job's listener.
    async fn submit(&mut self, job: RequestJob) -> Result<(), DeliveryError>;

    /// Release the session.
    async fn unbind(self: Box<Self>);
}
