use log::debug;
use std::sync::Arc;

use crate::delivery::{DeliveryService, RequestJob};

/// One-shot coordinator for dispatching a single job to the message
/// center: bind, submit, unbind, done.
///
/// A connection has no identity beyond that single cycle. The session
/// is released as soon as the job is handed over; the job's listener,
/// not the session, is the long-lived handle for the outcome.
pub struct ServiceConnection {
    service: Arc<dyn DeliveryService>,
    job: Option<RequestJob>,
}

impl ServiceConnection {
    pub fn new(service: Arc<dyn DeliveryService>, job: RequestJob) -> Self {
        ServiceConnection {
            service,
            job: Some(job),
        }
    }

    /// Run the bind → submit → unbind cycle.
    ///
    /// Guarded against duplicate calls within the cycle: the job slot is
    /// taken on the first call, so a second call finds nothing to do and
    /// no second submission can occur. If no session can be obtained the
    /// job's error path runs immediately.
    pub async fn connect(&mut self) {
        let Some(job) = self.job.take() else {
            debug!("connection already spent, ignoring duplicate connect");
            return;
        };

        match self.service.bind().await {
            Ok(mut session) => {
                if let Err(e) = session.submit(job.clone()).await {
                    job.listener.error(&job, e.into()).await;
                }
                // Session loss from here on is not a delivery failure;
                // the outcome travels through the job's listener.
                session.unbind().await;
            }
            Err(e) => {
                job.listener.error(&job, e.into()).await;
            }
        }
    }
}
