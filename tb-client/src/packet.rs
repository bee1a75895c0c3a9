//! Work packet descriptor shared with the host.
//!
//! The host owns every packet. The adapter reads `data`/`data_size`/`operation`/
//! `user_tag` and writes `status`/`result`/`result_size` right before the
//! completion callback; it never frees a packet and never touches it again
//! once the callback has returned.

use std::ffi::c_void;
use std::ptr;

use crate::status::PacketStatus;

/// One request/response pair. Layout is part of the ABI.
#[repr(C)]
#[derive(Debug)]
pub struct Packet {
    /// Host bookkeeping; never read by the adapter.
    pub user_data: *mut c_void,
    /// Request payload. May be null when `data_size` is 0.
    pub data: *const u8,
    pub data_size: u32,
    /// Opaque to the adapter; forwarded to the engine.
    pub user_tag: u16,
    /// Opaque to the adapter; forwarded to the engine.
    pub operation: u8,
    /// Written on completion (`PacketStatus`).
    pub status: u8,
    /// Written on completion. Valid only during the callback.
    pub result: *const u8,
    pub result_size: u32,
    pub reserved: u32,
}

impl Default for Packet {
    fn default() -> Self {
        Self {
            user_data: ptr::null_mut(),
            data: ptr::null(),
            data_size: 0,
            user_tag: 0,
            operation: 0,
            status: 0,
            result: ptr::null(),
            result_size: 0,
            reserved: 0,
        }
    }
}

fn data_size(len: usize) -> u32 {
    match u32::try_from(len) {
        Ok(size) => size,
        Err(_) => panic!("packet payload of {len} bytes does not fit in u32"),
    }
}

impl Packet {
    /// Packet pointing at `data`. The slice must outlive the packet's time in flight.
    ///
    /// # Panics
    /// If `data` is longer than `u32::MAX` bytes.
    pub fn new(operation: u8, data: &[u8]) -> Self {
        Self {
            operation,
            data: data.as_ptr(),
            data_size: data_size(data.len()),
            ..Self::default()
        }
    }

    /// Status written by the last completion, if it is a known code.
    pub fn completion_status(&self) -> Option<PacketStatus> {
        PacketStatus::from_u8(self.status)
    }

    /// Borrow the request payload, validating pointer/length and the size limit.
    ///
    /// # Safety
    /// `data` must point at `data_size` readable bytes whenever it is non-null.
    pub(crate) unsafe fn request(&self, max_payload_size: u32) -> Result<&[u8], PacketStatus> {
        if self.data_size > max_payload_size {
            return Err(PacketStatus::TooMuchData);
        }
        if self.data_size == 0 {
            return Ok(&[]);
        }
        if self.data.is_null() {
            return Err(PacketStatus::InvalidDataSize);
        }
        Ok(std::slice::from_raw_parts(self.data, self.data_size as usize))
    }
}
