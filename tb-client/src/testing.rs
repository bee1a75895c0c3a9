//! Callback recorder shared by the unit tests.

use std::slice;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::bridge::Bridge;
use crate::packet::Packet;

const WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub packet: usize,
    pub status: u64,
    pub result: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    completions: Mutex<Vec<Completion>>,
    changed: Condvar,
}

/// Collects callbacks. The completion context is the address of the shared
/// state, so it must outlive every client bound to it.
pub struct Recorder {
    inner: Arc<Inner>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::default()),
        }
    }

    pub fn context(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    pub fn callback(&self) -> crate::bridge::CompletionCallback {
        record
    }

    pub fn bridge(&self) -> Bridge {
        Bridge::new(self.context(), record)
    }

    pub fn count(&self) -> usize {
        self.inner.completions.lock().unwrap().len()
    }

    /// Wait until at least `n` completions arrived (or time out) and return them all.
    pub fn wait_for(&self, n: usize) -> Vec<Completion> {
        let deadline = Instant::now() + WAIT;
        let mut done = self.inner.completions.lock().unwrap();
        while done.len() < n {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            done = self.inner.changed.wait_timeout(done, left).unwrap().0;
        }
        done.clone()
    }
}

extern "C" fn record(ctx: usize, packet: *mut Packet, status: u64, result: *const u8, len: u32) {
    // SAFETY: ctx is `Recorder::context`, kept alive by the test.
    let inner = unsafe { &*(ctx as *const Inner) };
    let result = if result.is_null() {
        Vec::new()
    } else {
        unsafe { slice::from_raw_parts(result, len as usize) }.to_vec()
    };
    inner.completions.lock().unwrap().push(Completion {
        packet: packet as usize,
        status,
        result,
    });
    inner.changed.notify_all();
}

/// Log to the test writer when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
