//! Address list parsing. Purely local validation; nothing is resolved or probed.
//!
//! The list is comma separated. Each entry is one of:
//! - `port` (loopback, e.g. `3001`)
//! - `ip` (default port, e.g. `10.0.0.7` or `::1`)
//! - `ip:port` / `[ipv6]:port`

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Why an address list was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address list is empty")]
    Empty,
    #[error("address list is not valid UTF-8")]
    NotUtf8,
    #[error("malformed address entry {0:?}")]
    Malformed(String),
    #[error("{count} addresses given, at most {max} allowed")]
    LimitExceeded { count: usize, max: usize },
}

/// Parse `raw` into endpoints, preserving order.
pub fn parse_addresses(
    raw: &str,
    max: usize,
    default_port: u16,
) -> Result<Vec<SocketAddr>, AddressError> {
    if raw.trim().is_empty() {
        return Err(AddressError::Empty);
    }
    let count = raw.split(',').count();
    if count > max {
        return Err(AddressError::LimitExceeded { count, max });
    }
    raw.split(',')
        .map(|entry| parse_entry(entry.trim(), default_port))
        .collect()
}

/// Same as [`parse_addresses`] for a byte slice handed over the ABI.
pub fn parse_address_bytes(
    raw: &[u8],
    max: usize,
    default_port: u16,
) -> Result<Vec<SocketAddr>, AddressError> {
    let s = std::str::from_utf8(raw).map_err(|_| AddressError::NotUtf8)?;
    parse_addresses(s, max, default_port)
}

fn parse_entry(entry: &str, default_port: u16) -> Result<SocketAddr, AddressError> {
    if entry.is_empty() {
        return Err(AddressError::Malformed(String::new()));
    }
    if entry.bytes().all(|b| b.is_ascii_digit()) {
        let port = entry
            .parse::<u16>()
            .map_err(|_| AddressError::Malformed(entry.to_string()))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
    }
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }
    Err(AddressError::Malformed(entry.to_string()))
}
