//! Result codes that cross the C ABI. Discriminants are frozen; append only.

/// Returned by `tb_client_init` and `tb_client_init_echo`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStatus {
    Ok = 0,
    /// A panic was caught inside the adapter.
    Unexpected = 1,
    OutOfMemory = 2,
    InvalidAddress = 3,
    AddressLimitExceeded = 4,
    // 5 is reserved (concurrency limit); this adapter has no such setting.
    /// The engine thread or runtime could not be created.
    SystemResources = 6,
    // 7 is reserved (network subsystem).
    /// The capability gate rejected native mode in this host.
    Unsupported = 8,
    /// Null out-pointer, null cluster id or missing callback.
    InvalidArgument = 9,
}

/// Returned by `tb_client_submit`, `tb_client_deinit` and `tb_client_completion_context`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientStatus {
    Ok = 0,
    /// Null, never initialized, or already deinitialized handle.
    ClientInvalid = 1,
    /// Null packet pointer passed to submit.
    PacketInvalid = 2,
    /// Null output pointer.
    InvalidArgument = 3,
}

/// Per-packet outcome. Written to `Packet::status` and passed (widened to u64) to the callback.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketStatus {
    Ok = 0,
    /// Request payload exceeds `ClientConfig::max_payload_size`.
    TooMuchData = 1,
    /// `data` is null while `data_size` is non-zero.
    InvalidDataSize = 2,
    /// The client was torn down before the packet reached the engine.
    ClientShutdown = 3,
    /// The engine failed the packet (connection lost, timeout, bad reply).
    EngineFailure = 4,
}

impl PacketStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::TooMuchData),
            2 => Some(Self::InvalidDataSize),
            3 => Some(Self::ClientShutdown),
            4 => Some(Self::EngineFailure),
            _ => None,
        }
    }

    pub fn as_u64(self) -> u64 {
        u64::from(self as u8)
    }
}
