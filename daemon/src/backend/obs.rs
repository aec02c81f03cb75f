/// OBS Studio recording backend over obs-websocket protocol v5.
///
/// `connect` performs the Hello → Identify → Identified handshake (answering the
/// SHA-256 challenge when the server requires authentication) and then hands the
/// socket to a connection task.  The task owns both halves of the socket:
///   - outgoing requests arrive on an mpsc queue and are matched to their
///     responses by request id
///   - `RecordStateChanged` events are forwarded to the coordinator's queue
///     without blocking; a full queue drops the event
///
/// When the socket closes the task exits; later requests fail with
/// [`BackendError::Closed`], which the coordinator's liveness probe turns into
/// a reconnect.
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::RecordingBackend;
use crate::config::RecorderConfig;
use crate::error::BackendError;
use crate::event::BackendEvent;

const RPC_VERSION: u64 = 1;

const OP_HELLO: u8 = 0;
const OP_IDENTIFY: u8 = 1;
const OP_IDENTIFIED: u8 = 2;
const OP_EVENT: u8 = 5;
const OP_REQUEST: u8 = 6;
const OP_REQUEST_RESPONSE: u8 = 7;

/// `EventSubscription::Outputs`: carries `RecordStateChanged`.
const SUBSCRIBE_OUTPUTS: u64 = 1 << 6;
const CLOSE_AUTHENTICATION_FAILED: u16 = 4009;

const OUTPUT_STARTED: &str = "OBS_WEBSOCKET_OUTPUT_STARTED";
const OUTPUT_STOPPED: &str = "OBS_WEBSOCKET_OUTPUT_STOPPED";

const OUTGOING_QUEUE_DEPTH: usize = 16;
const CLOSE_GRACE: Duration = Duration::from_secs(1);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = oneshot::Sender<Result<Value, BackendError>>;

#[derive(Debug, Deserialize)]
struct Envelope {
    op: u8,
    #[serde(default)]
    d: Value,
}

/// A request queued for the connection task.
struct Outgoing {
    request_id: String,
    text: String,
    reply: Reply,
}

struct Connection {
    outgoing: mpsc::Sender<Outgoing>,
    task: JoinHandle<()>,
}

pub struct ObsBackend {
    address: String,
    password: String,
    request_timeout: Duration,
    connection: Option<Connection>,
    next_request_id: u64,
}

impl ObsBackend {
    pub fn new(config: &RecorderConfig) -> Self {
        Self {
            address: config.address(),
            password: config.password.clone(),
            request_timeout: config.request_timeout(),
            connection: None,
            next_request_id: 0,
        }
    }

    async fn handshake(&self) -> Result<(SplitSink<Socket, Message>, SplitStream<Socket>), BackendError> {
        let (socket, _) = connect_async(self.address.as_str())
            .await
            .map_err(|e| BackendError::Connect {
                address: self.address.clone(),
                reason: e.to_string(),
            })?;
        let (mut sink, mut stream) = socket.split();

        let hello = read_envelope(&mut stream, &self.address).await?;
        if hello.op != OP_HELLO {
            return Err(BackendError::Protocol(format!("expected Hello, got op {}", hello.op)));
        }

        let identify = identify_message(&hello.d, &self.password);
        sink.send(Message::Text(identify.to_string())).await?;

        let identified = read_envelope(&mut stream, &self.address).await?;
        if identified.op != OP_IDENTIFIED {
            return Err(BackendError::Protocol(format!(
                "expected Identified, got op {}",
                identified.op
            )));
        }
        Ok((sink, stream))
    }

    async fn call(&mut self, request_type: &str) -> Result<Value, BackendError> {
        self.next_request_id += 1;
        let request_id = self.next_request_id.to_string();
        let connection = self.connection.as_ref().ok_or(BackendError::Closed)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let text = request_message(request_type, &request_id).to_string();
        connection
            .outgoing
            .send(Outgoing { request_id, text, reply: reply_tx })
            .await
            .map_err(|_| BackendError::Closed)?;

        match tokio::time::timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BackendError::Closed),
            Err(_) => Err(BackendError::Timeout {
                request: request_type.to_string(),
                timeout: self.request_timeout,
            }),
        }
    }
}

#[async_trait]
impl RecordingBackend for ObsBackend {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn connect(&mut self, events: mpsc::Sender<BackendEvent>) -> Result<(), BackendError> {
        self.disconnect().await;

        let (sink, stream) = tokio::time::timeout(self.request_timeout, self.handshake())
            .await
            .map_err(|_| BackendError::Timeout {
                request: "Identify".to_string(),
                timeout: self.request_timeout,
            })??;

        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_QUEUE_DEPTH);
        let task = tokio::spawn(run_connection(sink, stream, outgoing_rx, events.clone()));
        self.connection = Some(Connection { outgoing: outgoing_tx, task });

        // Seed the session with the backend's current truth.
        let status = self.call("GetRecordStatus").await?;
        let active = status.get("outputActive").and_then(Value::as_bool).unwrap_or(false);
        // The coordinator drains the queue only after connect returns.
        forward_event(&events, BackendEvent::RecordStateChanged { active, output_path: None });
        Ok(())
    }

    async fn request_start(&mut self) -> Result<(), BackendError> {
        self.call("StartRecord").await.map(|_| ())
    }

    async fn request_stop(&mut self) -> Result<(), BackendError> {
        self.call("StopRecord").await.map(|_| ())
    }

    async fn probe(&mut self) -> Result<(), BackendError> {
        self.call("GetVersion").await.map(|_| ())
    }

    async fn disconnect(&mut self) {
        if let Some(Connection { outgoing, task }) = self.connection.take() {
            // Dropping the queue tells the task to send a close frame and exit.
            drop(outgoing);
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                debug!(address = %self.address, "Backend connection did not close in time");
            }
        }
    }
}

/// Connection task: multiplexes queued requests and incoming frames until either side closes.
async fn run_connection(
    mut sink: SplitSink<Socket, Message>,
    mut stream: SplitStream<Socket>,
    mut outgoing: mpsc::Receiver<Outgoing>,
    events: mpsc::Sender<BackendEvent>,
) {
    let mut pending: HashMap<String, Reply> = HashMap::new();

    loop {
        tokio::select! {
            request = outgoing.recv() => {
                let Some(request) = request else { break };
                if let Err(e) = sink.send(Message::Text(request.text)).await {
                    let _ = request.reply.send(Err(e.into()));
                    break;
                }
                pending.insert(request.request_id, request.reply);
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => dispatch(&text, &mut pending, &events),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "Backend socket error");
                        break;
                    }
                }
            }
        }
    }

    // Best-effort close frame.
    let _ = sink.send(Message::Close(None)).await;
    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(BackendError::Closed));
    }
    debug!("Backend connection task exited");
}

fn dispatch(text: &str, pending: &mut HashMap<String, Reply>, events: &mpsc::Sender<BackendEvent>) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(error = %e, "Ignoring malformed backend message");
            return;
        }
    };

    match envelope.op {
        OP_REQUEST_RESPONSE => {
            if let Some((request_id, result)) = parse_response(&envelope.d) {
                if let Some(reply) = pending.remove(&request_id) {
                    let _ = reply.send(result);
                }
            }
        }
        OP_EVENT => {
            if let Some(event) = parse_event(&envelope.d) {
                forward_event(events, event);
            }
        }
        op => debug!(op, "Ignoring backend message"),
    }
}

/// Queues an event for the coordinator without ever blocking the socket.
/// A full queue drops the event; the next `GetRecordStatus` after a reconnect
/// resyncs the session.
fn forward_event(events: &mpsc::Sender<BackendEvent>, event: BackendEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            warn!(?event, "Backend event queue full, dropping event");
        }
        Err(TrySendError::Closed(_)) => debug!("Coordinator dropped the event queue"),
    }
}

/// Reads the next JSON envelope during the handshake.
async fn read_envelope(stream: &mut SplitStream<Socket>, address: &str) -> Result<Envelope, BackendError> {
    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Close(frame) => return Err(close_error(frame, address)),
            _ => continue,
        }
    }
    Err(BackendError::Closed)
}

fn close_error(frame: Option<CloseFrame<'_>>, address: &str) -> BackendError {
    match frame {
        Some(frame) if u16::from(frame.code) == CLOSE_AUTHENTICATION_FAILED => {
            BackendError::AuthRejected { address: address.to_string() }
        }
        Some(frame) => BackendError::Protocol(format!(
            "connection closed during handshake ({}: {})",
            u16::from(frame.code),
            frame.reason
        )),
        None => BackendError::Closed,
    }
}

/// obs-websocket authentication string:
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`.
pub fn auth_response(password: &str, salt: &str, challenge: &str) -> String {
    let secret = STANDARD.encode(Sha256::digest(format!("{password}{salt}").as_bytes()));
    STANDARD.encode(Sha256::digest(format!("{secret}{challenge}").as_bytes()))
}

fn identify_message(hello: &Value, password: &str) -> Value {
    let mut d = json!({
        "rpcVersion": RPC_VERSION,
        "eventSubscriptions": SUBSCRIBE_OUTPUTS,
    });
    if let Some(auth) = hello.get("authentication") {
        let challenge = auth.get("challenge").and_then(Value::as_str).unwrap_or_default();
        let salt = auth.get("salt").and_then(Value::as_str).unwrap_or_default();
        d["authentication"] = Value::String(auth_response(password, salt, challenge));
    }
    json!({ "op": OP_IDENTIFY, "d": d })
}

fn request_message(request_type: &str, request_id: &str) -> Value {
    json!({
        "op": OP_REQUEST,
        "d": { "requestType": request_type, "requestId": request_id },
    })
}

fn parse_response(d: &Value) -> Option<(String, Result<Value, BackendError>)> {
    let request_id = d.get("requestId")?.as_str()?.to_string();
    let status = d.get("requestStatus");
    let succeeded = status
        .and_then(|s| s.get("result"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if succeeded {
        let data = d.get("responseData").cloned().unwrap_or(Value::Null);
        return Some((request_id, Ok(data)));
    }

    let code = status
        .and_then(|s| s.get("code"))
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok())
        .unwrap_or(0);
    let comment = status
        .and_then(|s| s.get("comment"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let request = d
        .get("requestType")
        .and_then(Value::as_str)
        .unwrap_or("request")
        .to_string();
    Some((request_id, Err(BackendError::Request { request, code, comment })))
}

/// Maps a `RecordStateChanged` event to a [`BackendEvent`]; other events yield `None`.
fn parse_event(d: &Value) -> Option<BackendEvent> {
    if d.get("eventType")?.as_str()? != "RecordStateChanged" {
        return None;
    }
    let data = d.get("eventData")?;
    let active = match data.get("outputState").and_then(Value::as_str) {
        Some(OUTPUT_STARTED) => true,
        Some(OUTPUT_STOPPED) => false,
        // Starting/stopping/paused: the file is still open while outputActive holds.
        _ => data.get("outputActive")?.as_bool()?,
    };
    let output_path = data
        .get("outputPath")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    Some(BackendEvent::RecordStateChanged { active, output_path })
}
