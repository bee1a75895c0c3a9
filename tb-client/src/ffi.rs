//! C ABI for embedding the client in foreign hosts (C/C++, WASM runtimes, managed-language bindings).
//!
//! Ownership across the boundary:
//! - `ClientHandle` and every `Packet` are host memory. The adapter writes the
//!   handle only from init/deinit and the packet only right before its callback.
//! - The completion callback must stay callable until `tb_client_deinit` returns.
//! - `result` bytes passed to the callback are valid only during the callback.
//!
//! No call unwinds into the host; a panic inside the adapter is reported as
//! `InitStatus::Unexpected` / `ClientStatus::ClientInvalid`.

use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::NonNull;
use std::slice;
use std::sync::Arc;

use crate::bridge::CompletionCallback;
use crate::client::{Client, Mode};
use crate::config::ClientConfig;
use crate::error::InitError;
use crate::gate;
use crate::packet::Packet;
use crate::registry::registry;
use crate::status::{ClientStatus, InitStatus};

/// Bumped whenever an exported signature or `#[repr(C)]` layout changes.
pub const ABI_VERSION: u32 = 1;

/// Host-allocated client slot. Zero it before first use; a zeroed slot is
/// simply an invalid handle.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClientHandle {
    key: u64,
    reserved: [u64; 3],
}

impl ClientHandle {
    pub fn is_zeroed(&self) -> bool {
        self.key == 0
    }
}

fn boundary<T: Copy + std::fmt::Debug>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(_) => {
            tracing::error!(status = ?on_panic, "panic caught at ABI boundary");
            on_panic
        }
    }
}

fn lookup(client: *mut ClientHandle) -> Option<Arc<Client>> {
    if client.is_null() {
        return None;
    }
    let key = unsafe { (*client).key };
    registry().get(key)
}

/// ABI version of this library.
#[no_mangle]
pub extern "C" fn tb_client_version() -> u32 {
    ABI_VERSION
}

/// Initialize a client that forwards packets to the engine at `address`.
///
/// `address` is `address_len` bytes of UTF-8 (not NUL terminated), a comma
/// separated list of `port`, `ip` or `ip:port` entries. On success `*client_out`
/// holds a usable handle; on any failure it is zeroed and nothing is allocated.
/// Returns `Unsupported` when the host has no networking; use
/// `tb_client_init_echo` there.
#[no_mangle]
pub extern "C" fn tb_client_init(
    client_out: *mut ClientHandle,
    cluster_id: *const [u8; 16],
    address_ptr: *const c_char,
    address_len: u32,
    completion_ctx: usize,
    completion_callback: Option<CompletionCallback>,
) -> InitStatus {
    init(
        Mode::Native,
        client_out,
        cluster_id,
        address_ptr,
        address_len,
        completion_ctx,
        completion_callback,
    )
}

/// Same contract as `tb_client_init`, but packets are completed locally with a
/// copy of their own payload. Never touches the network; works in every host.
#[no_mangle]
pub extern "C" fn tb_client_init_echo(
    client_out: *mut ClientHandle,
    cluster_id: *const [u8; 16],
    address_ptr: *const c_char,
    address_len: u32,
    completion_ctx: usize,
    completion_callback: Option<CompletionCallback>,
) -> InitStatus {
    init(
        Mode::Echo,
        client_out,
        cluster_id,
        address_ptr,
        address_len,
        completion_ctx,
        completion_callback,
    )
}

fn init(
    mode: Mode,
    client_out: *mut ClientHandle,
    cluster_id: *const [u8; 16],
    address_ptr: *const c_char,
    address_len: u32,
    completion_ctx: usize,
    completion_callback: Option<CompletionCallback>,
) -> InitStatus {
    boundary(InitStatus::Unexpected, || {
        if client_out.is_null() {
            return InitStatus::InvalidArgument;
        }
        unsafe { client_out.write(ClientHandle::default()) };
        let registered = build(
            mode,
            cluster_id,
            address_ptr,
            address_len,
            completion_ctx,
            completion_callback,
        )
        .and_then(|client| registry().register(client));
        match registered {
            Ok(key) => {
                unsafe { (*client_out).key = key };
                InitStatus::Ok
            }
            Err(err) => {
                tracing::debug!(?mode, error = %err, "init failed");
                InitStatus::from(&err)
            }
        }
    })
}

fn build(
    mode: Mode,
    cluster_id: *const [u8; 16],
    address_ptr: *const c_char,
    address_len: u32,
    completion_ctx: usize,
    completion_callback: Option<CompletionCallback>,
) -> Result<Client, InitError> {
    let callback = completion_callback.ok_or(InitError::InvalidArgument("completion_callback"))?;
    if cluster_id.is_null() {
        return Err(InitError::InvalidArgument("cluster_id"));
    }
    let cluster_id = unsafe { *cluster_id };
    let addresses: &[u8] = if address_ptr.is_null() {
        if address_len != 0 {
            return Err(InitError::InvalidArgument("address_ptr"));
        }
        &[]
    } else {
        unsafe { slice::from_raw_parts(address_ptr.cast::<u8>(), address_len as usize) }
    };
    Client::build(
        mode,
        cluster_id,
        addresses,
        completion_ctx,
        callback,
        &ClientConfig::default(),
        gate::global(),
    )
}

/// Submit a packet. Returns without waiting for completion. On `Ok` the
/// callback fires exactly once for this packet; until then the host must not
/// read, write or free it. On any other status the packet was not taken.
#[no_mangle]
pub extern "C" fn tb_client_submit(client: *mut ClientHandle, packet: *mut Packet) -> ClientStatus {
    boundary(ClientStatus::ClientInvalid, || {
        let Some(client) = lookup(client) else {
            return ClientStatus::ClientInvalid;
        };
        let Some(packet) = NonNull::new(packet) else {
            return ClientStatus::PacketInvalid;
        };
        match unsafe { client.submit(packet) } {
            Ok(()) => ClientStatus::Ok,
            Err(err) => err.into(),
        }
    })
}

/// Tear the client down. Blocks until every submitted packet has been called
/// back, then zeroes `*client`. Must not be called from inside the completion
/// callback. A second call returns `ClientInvalid`.
#[no_mangle]
pub extern "C" fn tb_client_deinit(client: *mut ClientHandle) -> ClientStatus {
    boundary(ClientStatus::ClientInvalid, || {
        if client.is_null() {
            return ClientStatus::ClientInvalid;
        }
        let key = unsafe { (*client).key };
        let Some(removed) = registry().remove(key) else {
            return ClientStatus::ClientInvalid;
        };
        unsafe { client.write(ClientHandle::default()) };
        match removed.deinit() {
            Ok(()) => ClientStatus::Ok,
            Err(err) => err.into(),
        }
    })
}

/// Read back the completion context bound at init.
#[no_mangle]
pub extern "C" fn tb_client_completion_context(
    client: *mut ClientHandle,
    completion_ctx_out: *mut usize,
) -> ClientStatus {
    boundary(ClientStatus::ClientInvalid, || {
        let Some(client) = lookup(client) else {
            return ClientStatus::ClientInvalid;
        };
        if client.is_closed() {
            return ClientStatus::ClientInvalid;
        }
        if completion_ctx_out.is_null() {
            return ClientStatus::InvalidArgument;
        }
        unsafe { completion_ctx_out.write(client.completion_context()) };
        ClientStatus::Ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PacketStatus;
    use crate::testing::Recorder;
    use std::ptr;

    const ZERO_CLUSTER: [u8; 16] = [0; 16];

    fn init_echo(recorder: &Recorder, address: &str) -> (ClientHandle, InitStatus) {
        let mut handle = ClientHandle::default();
        let status = tb_client_init_echo(
            &mut handle,
            &ZERO_CLUSTER,
            address.as_ptr().cast(),
            address.len() as u32,
            recorder.context(),
            Some(recorder.callback()),
        );
        (handle, status)
    }

    #[test]
    fn version() {
        assert_eq!(tb_client_version(), ABI_VERSION);
    }

    #[test]
    fn echo_scenario() {
        let recorder = Recorder::new();
        let (mut handle, status) = init_echo(&recorder, "127.0.0.1:0");
        assert_eq!(status, InitStatus::Ok);
        assert!(!handle.is_zeroed());

        let payload = [1u8, 2, 3];
        let mut packet = Packet::new(0, &payload);
        assert_eq!(tb_client_submit(&mut handle, &mut packet), ClientStatus::Ok);

        let done = recorder.wait_for(1);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].packet, &mut packet as *mut Packet as usize);
        assert_eq!(done[0].status, PacketStatus::Ok.as_u64());
        assert_eq!(done[0].result, vec![1, 2, 3]);
        assert_eq!(tb_client_deinit(&mut handle), ClientStatus::Ok);
    }

    #[test]
    fn empty_address_produces_no_handle() {
        let recorder = Recorder::new();
        let mut handle = ClientHandle {
            key: 999,
            reserved: [1; 3],
        };
        let status = tb_client_init(
            &mut handle,
            &ZERO_CLUSTER,
            ptr::null(),
            0,
            recorder.context(),
            Some(recorder.callback()),
        );
        assert_eq!(status, InitStatus::InvalidAddress);
        assert_eq!(handle, ClientHandle::default());

        let (mut handle, status) = init_echo(&recorder, "");
        assert_eq!(status, InitStatus::InvalidAddress);
        assert!(handle.is_zeroed());
        let mut packet = Packet::default();
        assert_eq!(tb_client_submit(&mut handle, &mut packet), ClientStatus::ClientInvalid);
    }

    #[test]
    fn address_errors_map_to_codes() {
        let recorder = Recorder::new();
        let (_, status) = init_echo(&recorder, "not-an-ip");
        assert_eq!(status, InitStatus::InvalidAddress);
        let (_, status) = init_echo(&recorder, "1,2,3,4,5,6,7");
        assert_eq!(status, InitStatus::AddressLimitExceeded);
    }

    #[test]
    fn init_then_deinit_releases_handle() {
        let recorder = Recorder::new();
        for _ in 0..10 {
            let (mut handle, status) = init_echo(&recorder, "3000");
            assert_eq!(status, InitStatus::Ok);
            let key = handle.key;
            assert!(registry().get(key).is_some());
            assert_eq!(tb_client_deinit(&mut handle), ClientStatus::Ok);
            assert!(registry().get(key).is_none());
            assert!(handle.is_zeroed());
        }
    }

    #[test]
    fn native_init_then_deinit() {
        if !gate::global().allows_native() {
            return;
        }
        let recorder = Recorder::new();
        let address = "127.0.0.1:3000";
        let mut handle = ClientHandle::default();
        let status = tb_client_init(
            &mut handle,
            &ZERO_CLUSTER,
            address.as_ptr().cast(),
            address.len() as u32,
            recorder.context(),
            Some(recorder.callback()),
        );
        assert_eq!(status, InitStatus::Ok);
        assert_eq!(tb_client_deinit(&mut handle), ClientStatus::Ok);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn deinit_twice() {
        let recorder = Recorder::new();
        let (mut handle, _) = init_echo(&recorder, "3000");
        let copy = handle;
        assert_eq!(tb_client_deinit(&mut handle), ClientStatus::Ok);
        assert_eq!(tb_client_deinit(&mut handle), ClientStatus::ClientInvalid);
        // A stale copy of the slot is just as dead.
        let mut copy = copy;
        assert_eq!(tb_client_deinit(&mut copy), ClientStatus::ClientInvalid);
    }

    #[test]
    fn submit_after_deinit_fails() {
        let recorder = Recorder::new();
        let (mut handle, _) = init_echo(&recorder, "3000");
        let mut stale = handle;
        assert_eq!(tb_client_deinit(&mut handle), ClientStatus::Ok);

        let payload = [1u8];
        let mut packet = Packet::new(0, &payload);
        assert_eq!(tb_client_submit(&mut handle, &mut packet), ClientStatus::ClientInvalid);
        assert_eq!(tb_client_submit(&mut stale, &mut packet), ClientStatus::ClientInvalid);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn null_arguments() {
        let recorder = Recorder::new();
        let address = "3000";

        let status = tb_client_init_echo(
            ptr::null_mut(),
            &ZERO_CLUSTER,
            address.as_ptr().cast(),
            address.len() as u32,
            0,
            Some(recorder.callback()),
        );
        assert_eq!(status, InitStatus::InvalidArgument);

        let mut handle = ClientHandle::default();
        let status = tb_client_init_echo(
            &mut handle,
            &ZERO_CLUSTER,
            address.as_ptr().cast(),
            address.len() as u32,
            0,
            None,
        );
        assert_eq!(status, InitStatus::InvalidArgument);

        let status = tb_client_init_echo(
            &mut handle,
            ptr::null(),
            address.as_ptr().cast(),
            address.len() as u32,
            0,
            Some(recorder.callback()),
        );
        assert_eq!(status, InitStatus::InvalidArgument);

        let status = tb_client_init_echo(
            &mut handle,
            &ZERO_CLUSTER,
            ptr::null(),
            4,
            0,
            Some(recorder.callback()),
        );
        assert_eq!(status, InitStatus::InvalidArgument);
        assert!(handle.is_zeroed());

        let mut packet = Packet::default();
        assert_eq!(
            tb_client_submit(ptr::null_mut(), &mut packet),
            ClientStatus::ClientInvalid
        );
        assert_eq!(tb_client_deinit(ptr::null_mut()), ClientStatus::ClientInvalid);
        let mut ctx = 0usize;
        assert_eq!(
            tb_client_completion_context(ptr::null_mut(), &mut ctx),
            ClientStatus::ClientInvalid
        );

        let (mut handle, status) = init_echo(&recorder, address);
        assert_eq!(status, InitStatus::Ok);
        assert_eq!(
            tb_client_submit(&mut handle, ptr::null_mut()),
            ClientStatus::PacketInvalid
        );
        assert_eq!(
            tb_client_completion_context(&mut handle, ptr::null_mut()),
            ClientStatus::InvalidArgument
        );
        assert_eq!(tb_client_deinit(&mut handle), ClientStatus::Ok);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn completion_context_round_trips() {
        let recorder = Recorder::new();
        let (mut handle, _) = init_echo(&recorder, "3000");
        let mut ctx = 0usize;
        assert_eq!(
            tb_client_completion_context(&mut handle, &mut ctx),
            ClientStatus::Ok
        );
        assert_eq!(ctx, recorder.context());
        assert_eq!(tb_client_deinit(&mut handle), ClientStatus::Ok);
        assert_eq!(
            tb_client_completion_context(&mut handle, &mut ctx),
            ClientStatus::ClientInvalid
        );
    }

    #[test]
    fn concurrent_submit_through_abi() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 50;

        let recorder = Recorder::new();
        let (mut handle, status) = init_echo(&recorder, "3000");
        assert_eq!(status, InitStatus::Ok);

        let payloads: Vec<[u8; 4]> = (0..(THREADS * PER_THREAD) as u32)
            .map(|i| i.to_le_bytes())
            .collect();
        let mut packets: Vec<Box<Packet>> = payloads
            .iter()
            .map(|p| Box::new(Packet::new(2, p)))
            .collect();
        let addrs: Vec<usize> = packets
            .iter_mut()
            .map(|p| p.as_mut() as *mut Packet as usize)
            .collect();

        let threads: Vec<_> = addrs
            .chunks(PER_THREAD)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                let mut handle = handle;
                std::thread::spawn(move || {
                    for addr in chunk {
                        let status = tb_client_submit(&mut handle, addr as *mut Packet);
                        assert_eq!(status, ClientStatus::Ok);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(tb_client_deinit(&mut handle), ClientStatus::Ok);

        let done = recorder.wait_for(THREADS * PER_THREAD);
        assert_eq!(done.len(), THREADS * PER_THREAD);
        let mut results: Vec<u32> = done
            .iter()
            .map(|c| u32::from_le_bytes(c.result.as_slice().try_into().unwrap()))
            .collect();
        results.sort_unstable();
        let expected: Vec<u32> = (0..(THREADS * PER_THREAD) as u32).collect();
        assert_eq!(results, expected);
    }
}
