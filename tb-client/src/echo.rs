//! Echo engine: completes every packet with a copy of its own payload.
//! Opens no network resources; used to exercise the ABI and callback plumbing.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::bridge::InFlight;
use crate::config::ClientConfig;
use crate::engine::Engine;
use crate::error::InitError;
use crate::gate::Gate;
use crate::status::PacketStatus;

enum Dispatch {
    /// No threads in this host: complete during submit.
    Inline { buffer: Vec<u8> },
    /// Worker thread drains a queue in submission order.
    Worker {
        tx: mpsc::Sender<InFlight>,
        worker: JoinHandle<()>,
    },
}

pub struct EchoEngine {
    dispatch: Dispatch,
    max_payload_size: u32,
}

impl EchoEngine {
    /// Start an echo engine. The reply buffer is reserved up front so that
    /// allocation failure surfaces at init, not per packet.
    pub fn start(config: &ClientConfig, gate: Gate) -> Result<Self, InitError> {
        let max_payload_size = config.max_payload_size;
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(max_payload_size as usize)?;

        if !gate.allows_native() {
            return Ok(Self {
                dispatch: Dispatch::Inline { buffer },
                max_payload_size,
            });
        }

        let (tx, rx) = mpsc::channel::<InFlight>();
        let worker = thread::Builder::new()
            .name(config.worker_thread_name.clone())
            .spawn(move || {
                let mut buffer = buffer;
                for packet in rx {
                    echo(packet, &mut buffer, max_payload_size);
                }
            })
            .map_err(InitError::SystemResources)?;
        Ok(Self {
            dispatch: Dispatch::Worker { tx, worker },
            max_payload_size,
        })
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.dispatch, Dispatch::Inline { .. })
    }
}

fn echo(packet: InFlight, buffer: &mut Vec<u8>, max_payload_size: u32) {
    buffer.clear();
    let status = match packet.request(max_payload_size) {
        Ok(request) => {
            buffer.extend_from_slice(request);
            PacketStatus::Ok
        }
        Err(status) => status,
    };
    if status == PacketStatus::Ok {
        packet.complete(status, buffer.as_slice());
    } else {
        packet.complete(status, &[]);
    }
}

impl Engine for EchoEngine {
    fn submit(&mut self, packet: InFlight) -> Result<(), InFlight> {
        match &mut self.dispatch {
            Dispatch::Inline { buffer } => {
                echo(packet, buffer, self.max_payload_size);
                Ok(())
            }
            Dispatch::Worker { tx, .. } => tx.send(packet).map_err(|e| e.0),
        }
    }

    fn shutdown(self: Box<Self>) {
        if let Dispatch::Worker { tx, worker } = self.dispatch {
            // Closing the queue lets the worker finish what is already queued, then exit.
            drop(tx);
            if worker.join().is_err() {
                tracing::warn!("echo worker panicked");
            }
        }
    }
}
