use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use log::{debug, error, info, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::Duration;

mod utils;

use courier::delivery::{DeliveryError, DeliveryService, DeliverySession};
use courier::models::{Direction, MessageStatus, StatusResponse};
use courier::query::ThreadQueryHandler;
use courier::store::MessageStore;
use courier::{peer, Composer, MessageRecord, RequestJob};

/// Token for the message list query of the active conversation.
const TRANSCRIPT_QUERY_TOKEN: u32 = 1;

/// Command line arguments for Courier
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Courier: a console messaging client with durable outbound delivery."
)]
struct Args {
    /// Raw contact identifier to talk to (resolved to a hashed peer id)
    #[arg(long, value_name = "CONTACT")]
    contact: Option<String>,

    /// Already-resolved peer identifier to talk to
    #[arg(long, value_name = "PEER", conflicts_with = "contact")]
    peer: Option<String>,

    /// Message database path (defaults to the platform data directory)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Log file path
    #[arg(long, value_name = "PATH", default_value = "courier.log")]
    log_file: PathBuf,
}

/// In-process message center used by this demo binary. It accepts every
/// job and, after a short delay, reports success with a fresh
/// server-assigned message id.
struct DemoCenter {
    jobs: mpsc::Sender<RequestJob>,
}

impl DemoCenter {
    fn start() -> Arc<DemoCenter> {
        let (jobs, mut rx) = mpsc::channel::<RequestJob>(16);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                debug!("center transmitting message {} to {}", job.record, job.peer);
                tokio::time::sleep(Duration::from_millis(250)).await;
                let response = StatusResponse::success(&uuid::Uuid::new_v4().to_string());
                job.listener.response(&job, vec![response]).await;
            }
        });
        Arc::new(DemoCenter { jobs })
    }
}

#[async_trait]
impl DeliveryService for DemoCenter {
    async fn bind(&self) -> Result<Box<dyn DeliverySession>, DeliveryError> {
        if self.jobs.is_closed() {
            return Err(DeliveryError::BindFailed("message center not running".to_string()));
        }
        Ok(Box::new(DemoSession {
            jobs: self.jobs.clone(),
        }))
    }
}

struct DemoSession {
    jobs: mpsc::Sender<RequestJob>,
}

#[async_trait]
impl DeliverySession for DemoSession {
    async fn submit(&mut self, job: RequestJob) -> Result<(), DeliveryError> {
        self.jobs
            .send(job)
            .await
            .map_err(|e| DeliveryError::SubmitFailed(e.to_string()))
    }

    async fn unbind(self: Box<Self>) {}
}

fn print_transcript(records: &[MessageRecord]) {
    println!("----");
    for record in records {
        match record.direction {
            Direction::Outbound => {
                let marker = match record.status {
                    MessageStatus::Sending => "...",
                    MessageStatus::Sent => " ok",
                    MessageStatus::NotAccepted => " no",
                    MessageStatus::Error => "err",
                };
                println!("[{}] me: {}", marker, record.content);
            }
            Direction::Inbound => println!("      {}: {}", record.peer, record.content),
        }
    }
    print!("> ");
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    utils::setup_logging(args.log_file.to_str(), LevelFilter::Debug)?;
    info!("Courier messaging client starting up");

    let db_path = match &args.db {
        Some(path) => path.clone(),
        None => MessageStore::default_path()?,
    };
    info!("Opening message store at {}", db_path.display());
    let store = MessageStore::open(&db_path)?;

    // Figure out who we are talking to.
    let (peer, mut thread_id) = if let Some(contact) = &args.contact {
        let (peer, thread_id) = peer::thread_for_contact(&store, contact).await?;
        info!("contact resolved to peer {}", peer);
        (peer, thread_id.unwrap_or(-1))
    } else if let Some(peer) = &args.peer {
        let thread_id = store.thread_for_peer(peer).await?;
        (peer.clone(), thread_id.unwrap_or(-1))
    } else {
        eprintln!("Enter a contact identifier to message:");
        let contact = utils::read_line()?;
        let (peer, thread_id) = peer::thread_for_contact(&store, &contact).await?;
        (peer, thread_id.unwrap_or(-1))
    };

    let center = DemoCenter::start();
    let composer = Composer::new(store.clone(), center);
    let (query_handler, mut completions) = ThreadQueryHandler::new(store.clone());
    let mut store_events = store.subscribe();

    println!("Talking to {}. Type a message and press enter.", peer);
    info!("starting conversation with {} (thread {})", peer, thread_id);
    if thread_id > 0 {
        query_handler.start_query(TRANSCRIPT_QUERY_TOKEN, thread_id);
    } else {
        print!("> ");
        use std::io::Write;
        let _ = std::io::stdout().flush();
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                match composer.send_message(&peer, text).await {
                    Ok((record, record_thread)) => {
                        debug!("composed message {}", record);
                        if thread_id <= 0 {
                            thread_id = record_thread;
                            info!("starting query with thread {}", thread_id);
                            query_handler.start_query(TRANSCRIPT_QUERY_TOKEN, thread_id);
                        }
                    }
                    Err(e) => {
                        // The draft is not lost; the store just refused it.
                        error!("unable to store message to outbox: {}", e);
                        eprintln!("Unable to store message to outbox, try again.");
                    }
                }
            }

            complete = completions.recv() => {
                let Some(complete) = complete else { break };
                match complete.token {
                    TRANSCRIPT_QUERY_TOKEN => match complete.result {
                        Ok(records) => print_transcript(&records),
                        Err(e) => eprintln!("Could not load the conversation: {}", e),
                    },
                    token => error!("query complete with unknown token {}", token),
                }
            }

            event = store_events.recv() => {
                match event {
                    Ok(event) if event.thread_id == thread_id => {
                        query_handler.start_query(TRANSCRIPT_QUERY_TOKEN, thread_id);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        debug!("missed {} store events, refreshing", missed);
                        if thread_id > 0 {
                            query_handler.start_query(TRANSCRIPT_QUERY_TOKEN, thread_id);
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!("Courier shutting down");
    Ok(())
}
