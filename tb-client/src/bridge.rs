//! Completion dispatch: turns engine results into the host callback.
//!
//! Every accepted packet becomes an [`InFlight`] token. Completing a token
//! consumes it; dropping one that was never completed delivers
//! `ClientShutdown`. Either way the host sees exactly one callback per packet.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::packet::Packet;
use crate::status::PacketStatus;

/// Host completion callback:
/// `(completion_ctx, packet, status, result_ptr, result_len)`.
///
/// Runs on whichever thread the engine completes on. `result_ptr` is valid
/// only until the callback returns. Calling `tb_client_deinit` for the same
/// client from inside the callback deadlocks.
pub type CompletionCallback = extern "C" fn(usize, *mut Packet, u64, *const u8, u32);

/// Per-client binding of context and callback.
#[derive(Debug)]
pub struct Bridge {
    context: usize,
    callback: CompletionCallback,
    in_flight: AtomicUsize,
}

impl Bridge {
    pub fn new(context: usize, callback: CompletionCallback) -> Self {
        Self {
            context,
            callback,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn context(&self) -> usize {
        self.context
    }

    /// Packets accepted but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn deliver(&self, packet: NonNull<Packet>, status: PacketStatus, result: &[u8]) {
        let (status, result) = match u32::try_from(result.len()) {
            Ok(_) => (status, result),
            Err(_) => (PacketStatus::TooMuchData, &[][..]),
        };
        let len = result.len() as u32;
        let ptr = if result.is_empty() {
            std::ptr::null()
        } else {
            result.as_ptr()
        };
        let raw = packet.as_ptr();
        // SAFETY: the host keeps the packet alive while it is in flight, and only
        // this token (hence this thread) may write to it until the callback returns.
        unsafe {
            (*raw).status = status as u8;
            (*raw).result = ptr;
            (*raw).result_size = len;
        }
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        // The packet belongs to the host again from here on; do not touch it after this call.
        (self.callback)(self.context, raw, status.as_u64(), ptr, len);
    }
}

/// A packet between accepted submit and its single completion.
#[derive(Debug)]
pub struct InFlight {
    packet: NonNull<Packet>,
    bridge: Arc<Bridge>,
    armed: bool,
}

// SAFETY: the host hands the packet over for the whole flight and promises not
// to touch it until the callback; the token is the only accessor meanwhile.
unsafe impl Send for InFlight {}

impl InFlight {
    /// # Safety
    /// `packet` must stay valid and untouched by the host until its callback.
    pub(crate) unsafe fn new(packet: NonNull<Packet>, bridge: Arc<Bridge>) -> Self {
        bridge.in_flight.fetch_add(1, Ordering::AcqRel);
        Self {
            packet,
            bridge,
            armed: true,
        }
    }

    fn packet(&self) -> &Packet {
        // SAFETY: see `new`.
        unsafe { self.packet.as_ref() }
    }

    pub fn operation(&self) -> u8 {
        self.packet().operation
    }

    pub fn user_tag(&self) -> u16 {
        self.packet().user_tag
    }

    /// Request payload, or the status the packet must fail with.
    pub fn request(&self, max_payload_size: u32) -> Result<&[u8], PacketStatus> {
        // SAFETY: see `new`.
        unsafe { self.packet().request(max_payload_size) }
    }

    /// Deliver the completion. `result` only needs to live for this call.
    pub fn complete(mut self, status: PacketStatus, result: &[u8]) {
        self.armed = false;
        self.bridge.deliver(self.packet, status, result);
    }

    /// Take the packet back without a callback, for a submit that is being
    /// rejected synchronously.
    pub(crate) fn reject(mut self) -> NonNull<Packet> {
        self.armed = false;
        self.bridge.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.packet
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            self.bridge
                .deliver(self.packet, PacketStatus::ClientShutdown, &[]);
        }
    }
}
