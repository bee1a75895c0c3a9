//! Capability gate: does this host give us threads and sockets?
//!
//! Resolved once per process on first use and cached. `Restricted` hosts
//! (wasm32, sandboxes) only get echo clients; native init fails fast with
//! `Unsupported` instead of hanging on a socket that can never open.

use std::net::{Ipv4Addr, UdpSocket};
use std::sync::OnceLock;

/// What the host can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Threads and sockets are available.
    Native,
    /// No transport primitives; echo only, completions delivered inline.
    Restricted,
}

/// Snapshot of the capability decision. Copy it around; the process-wide
/// value comes from [`global`], tests and embedders may force one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    capability: Capability,
}

impl Gate {
    pub const fn native() -> Self {
        Self {
            capability: Capability::Native,
        }
    }

    pub const fn restricted() -> Self {
        Self {
            capability: Capability::Restricted,
        }
    }

    /// Probe the current host. Local checks only: spawn and join a thread,
    /// bind a loopback UDP socket.
    pub fn probe() -> Self {
        if cfg!(target_arch = "wasm32") {
            return Self::restricted();
        }
        let threads = std::thread::Builder::new()
            .name("tb-client-probe".to_string())
            .spawn(|| ())
            .map(|h| h.join().is_ok())
            .unwrap_or(false);
        let sockets = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).is_ok();
        if threads && sockets {
            Self::native()
        } else {
            Self::restricted()
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn allows_native(&self) -> bool {
        self.capability == Capability::Native
    }
}

static GLOBAL: OnceLock<Gate> = OnceLock::new();

/// Process-wide gate, probed on first call.
pub fn global() -> Gate {
    *GLOBAL.get_or_init(|| {
        let gate = Gate::probe();
        tracing::debug!(capability = ?gate.capability(), "capability gate resolved");
        gate
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_states() {
        assert!(Gate::native().allows_native());
        assert!(!Gate::restricted().allows_native());
        assert_eq!(Gate::restricted().capability(), Capability::Restricted);
    }

    #[test]
    fn global_is_cached() {
        let first = global();
        assert_eq!(GLOBAL.get().copied(), Some(first));
        assert_eq!(global(), first);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_host_is_native() {
        // The test harness itself runs on threads.
        assert_eq!(Gate::probe().capability(), Capability::Native);
    }
}
