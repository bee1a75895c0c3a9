//! Forwarding engine: hands packets to a remote engine over TCP.
//!
//! Runs a current-thread tokio runtime on its own thread. Packets are sent
//! one at a time as length-prefixed frames (see `wire`). Any connect, I/O,
//! framing or timeout error fails that packet with `EngineFailure` and drops
//! the connection; the next packet reconnects. Failed packets are never
//! retried here.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};

use crate::bridge::InFlight;
use crate::config::ClientConfig;
use crate::engine::Engine;
use crate::error::InitError;
use crate::status::PacketStatus;
use crate::wire::{self, FrameDecodeError, LEN_SIZE, REPLY_HEADER_SIZE};

#[derive(Default)]
struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

/// Why one exchange failed.
#[derive(Debug, thiserror::Error)]
enum ForwardError {
    #[error("no endpoint reachable ({0} tried)")]
    Unreachable(usize),
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad reply frame: {0}")]
    Frame(#[from] FrameDecodeError),
    #[error("request timed out")]
    Timeout,
}

pub struct NativeEngine {
    tx: Option<mpsc::UnboundedSender<InFlight>>,
    shutdown: Arc<Shutdown>,
    worker: Option<JoinHandle<()>>,
}

impl NativeEngine {
    /// Build the runtime and spawn the engine thread. No connection is opened
    /// until the first packet arrives.
    pub fn start(
        cluster_id: [u8; 16],
        endpoints: Vec<SocketAddr>,
        config: &ClientConfig,
    ) -> Result<Self, InitError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(InitError::SystemResources)?;

        let mut reply = Vec::new();
        reply.try_reserve_exact(LEN_SIZE + REPLY_HEADER_SIZE + config.max_payload_size as usize)?;
        let forwarder = Forwarder {
            cluster_id,
            endpoints,
            max_payload_size: config.max_payload_size,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            stream: None,
            reply,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Shutdown::default());
        let worker_shutdown = shutdown.clone();
        let worker = thread::Builder::new()
            .name(config.worker_thread_name.clone())
            .spawn(move || runtime.block_on(forwarder.run(rx, worker_shutdown)))
            .map_err(InitError::SystemResources)?;

        Ok(Self {
            tx: Some(tx),
            shutdown,
            worker: Some(worker),
        })
    }
}

impl Engine for NativeEngine {
    fn submit(&mut self, packet: InFlight) -> Result<(), InFlight> {
        match &self.tx {
            Some(tx) => tx.send(packet).map_err(|e| e.0),
            None => Err(packet),
        }
    }

    fn shutdown(mut self: Box<Self>) {
        self.shutdown.requested.store(true, Ordering::Release);
        self.shutdown.notify.notify_one();
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("native engine thread panicked");
            }
        }
    }
}

struct Forwarder {
    cluster_id: [u8; 16],
    endpoints: Vec<SocketAddr>,
    max_payload_size: u32,
    connect_timeout: Duration,
    request_timeout: Duration,
    stream: Option<TcpStream>,
    reply: Vec<u8>,
}

impl Forwarder {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<InFlight>, shutdown: Arc<Shutdown>) {
        while let Some(packet) = rx.recv().await {
            if shutdown.requested.load(Ordering::Acquire) {
                packet.complete(PacketStatus::ClientShutdown, &[]);
                continue;
            }
            let encoded = packet.request(self.max_payload_size).map(|payload| {
                wire::encode_request(
                    &self.cluster_id,
                    packet.operation(),
                    packet.user_tag(),
                    payload,
                    self.max_payload_size,
                )
            });
            let frame = match encoded {
                Ok(Ok(frame)) => frame,
                Ok(Err(_)) => {
                    packet.complete(PacketStatus::TooMuchData, &[]);
                    continue;
                }
                Err(status) => {
                    packet.complete(status, &[]);
                    continue;
                }
            };

            let outcome = tokio::select! {
                biased;
                _ = shutdown.notify.notified() => None,
                result = self.forward(&frame) => Some(result),
            };
            let failed = match outcome {
                None => {
                    packet.complete(PacketStatus::ClientShutdown, &[]);
                    continue;
                }
                Some(Ok(())) => match wire::decode_reply(&self.reply, self.max_payload_size) {
                    Ok((reply, _)) => {
                        let status = PacketStatus::from_u8(reply.status)
                            .unwrap_or(PacketStatus::EngineFailure);
                        packet.complete(status, reply.payload);
                        continue;
                    }
                    Err(err) => ForwardError::Frame(err),
                },
                Some(Err(err)) => err,
            };
            tracing::warn!(error = %failed, "packet failed in engine");
            packet.complete(PacketStatus::EngineFailure, &[]);
        }
        tracing::debug!("native engine stopped");
    }

    /// One request/reply exchange. On success the whole reply frame is in `self.reply`.
    async fn forward(&mut self, frame: &[u8]) -> Result<(), ForwardError> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };
        let exchange = exchange(&mut stream, frame, &mut self.reply, self.max_payload_size);
        tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| ForwardError::Timeout)??;
        self.stream = Some(stream);
        Ok(())
    }

    async fn connect(&self) -> Result<TcpStream, ForwardError> {
        for addr in &self.endpoints {
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(*addr)).await {
                Ok(Ok(stream)) => {
                    stream.set_nodelay(true)?;
                    tracing::debug!(%addr, "connected");
                    return Ok(stream);
                }
                Ok(Err(err)) => tracing::debug!(%addr, error = %err, "connect failed"),
                Err(_) => tracing::debug!(%addr, "connect timed out"),
            }
        }
        Err(ForwardError::Unreachable(self.endpoints.len()))
    }
}

async fn exchange(
    stream: &mut TcpStream,
    frame: &[u8],
    reply: &mut Vec<u8>,
    max_payload_size: u32,
) -> Result<(), ForwardError> {
    stream.write_all(frame).await?;
    stream.flush().await?;
    let mut prefix = [0u8; LEN_SIZE];
    stream.read_exact(&mut prefix).await?;
    let len = wire::body_len(prefix, REPLY_HEADER_SIZE, max_payload_size)?;
    reply.clear();
    reply.extend_from_slice(&prefix);
    reply.resize(LEN_SIZE + len, 0);
    stream.read_exact(&mut reply[LEN_SIZE..]).await?;
    Ok(())
}
