//! One logical client: parsed endpoints, bound callback, exclusively owned engine.

use std::net::SocketAddr;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::address::parse_address_bytes;
use crate::bridge::{Bridge, CompletionCallback, InFlight};
use crate::config::ClientConfig;
use crate::echo::EchoEngine;
use crate::engine::Engine;
use crate::error::{ClientError, InitError};
use crate::gate::Gate;
use crate::packet::Packet;

/// How packets are serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Forwarded to the remote engine.
    Native,
    /// Completed locally with the request payload.
    Echo,
}

/// A fully initialized client. There is no partially built state: construction
/// either returns a usable client or an error with nothing left behind.
pub struct Client {
    cluster_id: [u8; 16],
    endpoints: Vec<SocketAddr>,
    mode: Mode,
    bridge: Arc<Bridge>,
    /// `None` once deinitialized.
    engine: Mutex<Option<Box<dyn Engine>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Client {
    /// Client backed by the forwarding engine. Fails with `Unsupported` when
    /// the gate reports no networking.
    pub fn init(
        cluster_id: [u8; 16],
        addresses: &str,
        context: usize,
        callback: CompletionCallback,
        config: &ClientConfig,
        gate: Gate,
    ) -> Result<Self, InitError> {
        Self::build(
            Mode::Native,
            cluster_id,
            addresses.as_bytes(),
            context,
            callback,
            config,
            gate,
        )
    }

    /// Client that echoes every payload back. Works under any gate.
    pub fn init_echo(
        cluster_id: [u8; 16],
        addresses: &str,
        context: usize,
        callback: CompletionCallback,
        config: &ClientConfig,
        gate: Gate,
    ) -> Result<Self, InitError> {
        Self::build(
            Mode::Echo,
            cluster_id,
            addresses.as_bytes(),
            context,
            callback,
            config,
            gate,
        )
    }

    pub(crate) fn build(
        mode: Mode,
        cluster_id: [u8; 16],
        addresses: &[u8],
        context: usize,
        callback: CompletionCallback,
        config: &ClientConfig,
        gate: Gate,
    ) -> Result<Self, InitError> {
        if mode == Mode::Native && !gate.allows_native() {
            return Err(InitError::Unsupported);
        }
        let endpoints = parse_address_bytes(addresses, config.max_addresses, config.default_port)?;
        let engine: Box<dyn Engine> = match mode {
            Mode::Echo => Box::new(EchoEngine::start(config, gate)?),
            Mode::Native => native_engine(cluster_id, endpoints.clone(), config)?,
        };
        tracing::debug!(?mode, endpoints = endpoints.len(), "client initialized");
        Ok(Self::with_engine(
            cluster_id, endpoints, mode, context, callback, engine,
        ))
    }

    /// Wrap an already running engine.
    pub fn with_engine(
        cluster_id: [u8; 16],
        endpoints: Vec<SocketAddr>,
        mode: Mode,
        context: usize,
        callback: CompletionCallback,
        engine: Box<dyn Engine>,
    ) -> Self {
        Self {
            cluster_id,
            endpoints,
            mode,
            bridge: Arc::new(Bridge::new(context, callback)),
            engine: Mutex::new(Some(engine)),
        }
    }

    pub fn cluster_id(&self) -> [u8; 16] {
        self.cluster_id
    }

    pub fn endpoints(&self) -> &[SocketAddr] {
        &self.endpoints
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn completion_context(&self) -> usize {
        self.bridge.context()
    }

    /// Packets accepted and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.bridge.in_flight()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.engine).is_none()
    }

    /// Queue a packet. On `Ok` exactly one callback follows; on `Err` the
    /// packet was not taken and no callback fires.
    ///
    /// # Safety
    /// `packet` must stay valid, and the caller must not touch it, until its
    /// completion callback has been invoked.
    pub unsafe fn submit(&self, packet: NonNull<Packet>) -> Result<(), ClientError> {
        let mut engine = lock(&self.engine);
        let Some(engine) = engine.as_mut() else {
            return Err(ClientError::Closed);
        };
        let token = InFlight::new(packet, self.bridge.clone());
        engine.submit(token).map_err(|token| {
            token.reject();
            tracing::warn!("engine stopped accepting packets");
            ClientError::EngineStopped
        })
    }

    /// Shut the engine down. Returns once every accepted packet has had its
    /// callback. A second call returns `Closed`.
    pub fn deinit(&self) -> Result<(), ClientError> {
        let engine = lock(&self.engine).take().ok_or(ClientError::Closed)?;
        engine.shutdown();
        tracing::debug!(mode = ?self.mode, "client deinitialized");
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let engine = self
            .engine
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(engine) = engine {
            engine.shutdown();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn native_engine(
    cluster_id: [u8; 16],
    endpoints: Vec<SocketAddr>,
    config: &ClientConfig,
) -> Result<Box<dyn Engine>, InitError> {
    Ok(Box::new(crate::native::NativeEngine::start(
        cluster_id, endpoints, config,
    )?))
}

#[cfg(target_arch = "wasm32")]
fn native_engine(
    _cluster_id: [u8; 16],
    _endpoints: Vec<SocketAddr>,
    _config: &ClientConfig,
) -> Result<Box<dyn Engine>, InitError> {
    Err(InitError::Unsupported)
}
