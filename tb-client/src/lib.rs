//! Host-embeddable client adapter.
//! Hosts drive it through a small C ABI: init, submit packets, receive
//! completions via callback, deinit. Payloads are opaque bytes.

pub mod address;
pub mod bridge;
pub mod client;
pub mod config;
pub mod echo;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod gate;
pub mod packet;
pub mod registry;
pub mod status;
pub mod wire;

#[cfg(not(target_arch = "wasm32"))]
pub mod native;

#[cfg(test)]
mod testing;

pub use bridge::{CompletionCallback, InFlight};
pub use client::{Client, Mode};
pub use config::ClientConfig;
pub use engine::Engine;
pub use error::{ClientError, InitError};
pub use ffi::ClientHandle;
pub use gate::{Capability, Gate};
pub use packet::Packet;
pub use status::{ClientStatus, InitStatus, PacketStatus};
