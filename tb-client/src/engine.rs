//! The seam between the adapter and whatever actually services packets.

use crate::bridge::InFlight;

/// A packet-servicing backend owned by exactly one client.
///
/// Calls are serialized by the owning client. Every token accepted by
/// `submit` must eventually be completed or dropped (which reports
/// `ClientShutdown`); `shutdown` returns only once that has happened for all
/// of them.
pub trait Engine: Send {
    /// Accept a packet for processing. Hand the token back if the engine can
    /// no longer take work; the submit then fails synchronously.
    fn submit(&mut self, packet: InFlight) -> Result<(), InFlight>;

    /// Stop, finish or fail everything accepted so far, release resources.
    fn shutdown(self: Box<Self>);
}
