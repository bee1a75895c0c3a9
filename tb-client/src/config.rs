//! Client tuning knobs. The C ABI always uses `ClientConfig::default()`;
//! Rust hosts may deserialize their own from whatever format they carry.

use serde::Deserialize;

/// Limits and timeouts applied to one client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Largest request or reply payload in bytes (default 1 MiB).
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: u32,
    /// Most endpoints accepted in one address list (default 6).
    #[serde(default = "default_max_addresses")]
    pub max_addresses: usize,
    /// Port used for entries that name only an IP (default 3000).
    #[serde(default = "default_port")]
    pub default_port: u16,
    /// Name given to the engine thread.
    #[serde(default = "default_worker_thread_name")]
    pub worker_thread_name: String,
    /// Per-endpoint TCP connect timeout for the forwarding engine.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Time allowed for one request/reply exchange before the packet fails.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_max_payload_size() -> u32 {
    1024 * 1024
}
fn default_max_addresses() -> usize {
    6
}
fn default_port() -> u16 {
    3000
}
fn default_worker_thread_name() -> String {
    "tb-client".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_payload_size: default_max_payload_size(),
            max_addresses: default_max_addresses(),
            default_port: default_port(),
            worker_thread_name: default_worker_thread_name(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}
