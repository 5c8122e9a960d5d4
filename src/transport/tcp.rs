//! The pipelined TCP transport executor: at most one persistent connection
//! per nameserver, multiplexing many in-flight queries by transaction ID.
//!
//! The connection itself lives in a background task ("the connection
//! actor"), driven by a command/responder pattern: callers send commands
//! over an `mpsc` channel and get results back via a per-query
//! `oneshot::Sender<T>`.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Sleep;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::{decode_message, encode_message, MAX_TCP_PACKET};
use crate::error::DnsError;
use crate::executor::{check_cancelled, Executor};
use crate::message::{Message, Query};
use crate::util::random_txid;

/// How long a connection with no pending work lingers before closing.
const IDLE_TIMEOUT: Duration = Duration::from_millis(50);

type Responder = oneshot::Sender<Result<Message, DnsError>>;

enum Command {
    Query { ticket: u64, query: Query, resp: Responder },
    Cancel { ticket: u64 },
}

pub struct TcpTransport {
    nameserver: SocketAddr,
    actor: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    next_ticket: AtomicU64,
}

impl TcpTransport {
    pub fn new(nameserver: SocketAddr) -> Self {
        Self {
            nameserver,
            actor: Mutex::new(None),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Returns a sender for the live connection actor, spawning one if none
    /// exists or the previous one has shut down (e.g. after idle-close).
    async fn connection_sender(&self) -> mpsc::UnboundedSender<Command> {
        let mut guard = self.actor.lock().await;
        if let Some(tx) = guard.as_ref() {
            if !tx.is_closed() {
                return tx.clone();
            }
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let nameserver = self.nameserver;
        tokio::spawn(run_connection(nameserver, rx));
        *guard = Some(tx.clone());
        tx
    }
}

#[async_trait]
impl Executor for TcpTransport {
    async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError> {
        check_cancelled(&cancel)?;

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (resp_tx, resp_rx) = oneshot::channel();
        let cmd_tx = self.connection_sender().await;

        if cmd_tx
            .send(Command::Query { ticket, query, resp: resp_tx })
            .is_err()
        {
            return Err(DnsError::QueryFailed("tcp connection actor is gone".into()));
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = cmd_tx.send(Command::Cancel { ticket });
                Err(DnsError::Cancelled)
            }
            result = resp_rx => match result {
                Ok(inner) => inner,
                Err(_) => Err(DnsError::QueryFailed("executor closed".into())),
            },
        }
    }
}

struct Queued {
    ticket: u64,
    query: Query,
    resp: Responder,
}

/// Runs the Disconnected → Connecting → Connected → Idle state machine for
/// one nameserver until the command channel closes or every connection
/// attempt is abandoned.
async fn run_connection(nameserver: SocketAddr, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut queue: VecDeque<Queued> = VecDeque::new();

    let Some(first) = rx.recv().await else { return };
    admit(&mut queue, first);

    loop {
        let stream = match connect_with_queue(nameserver, &mut rx, &mut queue).await {
            Some(stream) => stream,
            None => return, // command channel closed, nothing left to serve
        };

        if queue.is_empty() {
            // Every queued query was cancelled mid-connect; the caller side
            // already aborted interest, but we still established a socket —
            // drop it and wait for the next command from Disconnected.
            drop(stream);
            match rx.recv().await {
                Some(cmd) => {
                    admit(&mut queue, cmd);
                    continue;
                }
                None => return,
            }
        }

        debug!(server = %nameserver, "tcp connected");
        if !run_connected(stream, &mut rx, &mut queue).await {
            return;
        }
    }
}

/// Drives the Connecting state: attempts `TcpStream::connect` while still
/// accepting new queries (queued, not sent) and cancellations. Returns
/// `None` only when the command channel has closed for good.
async fn connect_with_queue(
    nameserver: SocketAddr,
    rx: &mut mpsc::UnboundedReceiver<Command>,
    queue: &mut VecDeque<Queued>,
) -> Option<TcpStream> {
    'attempt: loop {
        let connect_fut = TcpStream::connect(nameserver);
        tokio::pin!(connect_fut);

        loop {
            tokio::select! {
                result = &mut connect_fut => {
                    match result {
                        Ok(stream) => return Some(stream),
                        Err(err) => {
                            warn!(server = %nameserver, error = %err, "tcp connect failed");
                            fail_all(queue, || DnsError::QueryFailed(format!(
                                "tcp connect to {nameserver} failed: {err}"
                            )));
                            match rx.recv().await {
                                Some(cmd) => { admit(queue, cmd); continue 'attempt; }
                                None => return None,
                            }
                        }
                    }
                }
                maybe_cmd = rx.recv() => {
                    match maybe_cmd {
                        Some(Command::Query { ticket, query, resp }) => {
                            queue.push_back(Queued { ticket, query, resp });
                        }
                        Some(Command::Cancel { ticket }) => {
                            queue.retain(|q| q.ticket != ticket);
                            if queue.is_empty() {
                                // Every queued query was cancelled: abandon
                                // this attempt and wait for fresh work.
                                match rx.recv().await {
                                    Some(cmd) => { admit(queue, cmd); continue 'attempt; }
                                    None => return None,
                                }
                            }
                        }
                        None => {
                            fail_all(queue, || DnsError::QueryFailed("executor closed".into()));
                            return None;
                        }
                    }
                }
            }
        }
    }
}

fn admit(queue: &mut VecDeque<Queued>, cmd: Command) {
    match cmd {
        Command::Query { ticket, query, resp } => queue.push_back(Queued { ticket, query, resp }),
        Command::Cancel { ticket } => queue.retain(|q| q.ticket != ticket),
    }
}

fn fail_all(queue: &mut VecDeque<Queued>, make_err: impl Fn() -> DnsError) {
    for queued in queue.drain(..) {
        let _ = queued.resp.send(Err(make_err()));
    }
}

fn fail_all_pending(pending: &mut HashMap<u16, (u64, Responder)>, err: DnsError) {
    for (_, (_, resp)) in pending.drain() {
        let _ = resp.send(Err(DnsError::QueryFailed(err.to_string())));
    }
}

type FramedTcp = Framed<TcpStream, LengthDelimitedCodec>;

/// Drives the Connected/Idle states for one live socket. Returns `false`
/// when the command channel has closed for good (executor dropped).
async fn run_connected(
    stream: TcpStream,
    rx: &mut mpsc::UnboundedReceiver<Command>,
    queue: &mut VecDeque<Queued>,
) -> bool {
    let codec = LengthDelimitedCodec::builder()
        .length_field_length(2)
        .big_endian()
        .new_codec();
    let framed: FramedTcp = Framed::new(stream, codec);
    let (mut sink, mut source) = framed.split();

    let mut pending: HashMap<u16, (u64, Responder)> = HashMap::new();

    for queued in queue.drain(..) {
        dispatch(&mut sink, &mut pending, queued).await;
    }

    let mut idle_timer = arm_idle_timer_if_empty(&pending);

    loop {
        tokio::select! {
            cmd = rx.recv() => {
                match cmd {
                    Some(Command::Query { ticket, query, resp }) => {
                        idle_timer = None;
                        dispatch(&mut sink, &mut pending, Queued { ticket, query, resp }).await;
                    }
                    Some(Command::Cancel { ticket }) => {
                        pending.retain(|_, (t, _)| *t != ticket);
                        idle_timer = arm_idle_timer_if_empty(&pending);
                    }
                    None => {
                        fail_all_pending(&mut pending, DnsError::QueryFailed("executor closed".into()));
                        return false;
                    }
                }
            }
            frame = source.next() => {
                match frame {
                    Some(Ok(bytes)) => {
                        match decode_message(&bytes) {
                            Ok(message) => {
                                if let Some((_, resp)) = pending.remove(&message.id) {
                                    let _ = resp.send(Ok(message));
                                    idle_timer = arm_idle_timer_if_empty(&pending);
                                } else {
                                    trace!(id = message.id, "dropping response with unknown transaction id");
                                }
                            }
                            Err(err) => {
                                warn!(error = %err, "tcp response failed to parse, closing connection");
                                fail_all_pending(&mut pending, DnsError::QueryFailed(format!(
                                    "malformed tcp response: {err}"
                                )));
                                return true;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "tcp read error, closing connection");
                        fail_all_pending(&mut pending, DnsError::QueryFailed(format!("tcp read error: {err}")));
                        return true;
                    }
                    None => {
                        debug!("tcp peer closed the connection");
                        fail_all_pending(&mut pending, DnsError::QueryFailed("peer closed the connection".into()));
                        return true;
                    }
                }
            }
            _ = sleep_or_pending(&mut idle_timer) => {
                debug!("tcp connection idle, closing");
                return true;
            }
        }
    }
}

fn arm_idle_timer_if_empty(pending: &HashMap<u16, (u64, Responder)>) -> Option<Pin<Box<Sleep>>> {
    if pending.is_empty() {
        Some(Box::pin(tokio::time::sleep(IDLE_TIMEOUT)))
    } else {
        None
    }
}

async fn sleep_or_pending(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.await,
        None => futures::future::pending::<()>().await,
    }
}

async fn dispatch(
    sink: &mut futures::stream::SplitSink<FramedTcp, Bytes>,
    pending: &mut HashMap<u16, (u64, Responder)>,
    queued: Queued,
) {
    let id = unique_id(pending);
    let mut message = Message::create_request(queued.query);
    message.id = id;

    let bytes = match encode_message(&message) {
        Ok(bytes) => bytes,
        Err(err) => {
            let _ = queued.resp.send(Err(err));
            return;
        }
    };
    if bytes.len() > MAX_TCP_PACKET {
        let _ = queued.resp.send(Err(DnsError::InvalidConfiguration(format!(
            "query is {} bytes, exceeds the {MAX_TCP_PACKET}-byte TCP limit",
            bytes.len()
        ))));
        return;
    }

    if let Err(err) = sink.send(Bytes::from(bytes)).await {
        let _ = queued.resp.send(Err(DnsError::QueryFailed(format!("tcp write failed: {err}"))));
        return;
    }

    pending.insert(id, (queued.ticket, queued.resp));
}

/// Draws a fresh transaction ID, retrying on collision with this
/// connection's own pending set — IDs are per-connection, never global.
fn unique_id(pending: &HashMap<u16, (u64, Responder)>) -> u16 {
    loop {
        let id = random_txid();
        if !pending.contains_key(&id) {
            return id;
        }
    }
}
