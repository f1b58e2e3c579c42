use crate::errors::CacheError;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Normalized server name used as an index key.
///
/// DNS names are lower-cased without a trailing dot. IP addresses are stored in
/// their bracketed literal form (`[203.0.113.5]`, `[2001:db8::1]`), the same form
/// certificate IP SANs are indexed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hostname {
    key: Arc<str>,
    ip: Option<IpAddr>,
}

impl Hostname {
    /// Parse a requested name. Accepts an optional `:port` and `[...]` brackets.
    pub fn parse(input: &str) -> Result<Self, CacheError> {
        let invalid = || CacheError::InvalidName(input.to_string());

        if input.is_empty() {
            return Err(invalid());
        }

        if let Some(rest) = input.strip_prefix('[') {
            let (inner, tail) = rest.split_once(']').ok_or_else(invalid)?;
            if !tail.is_empty() && !is_port_suffix(tail) {
                return Err(invalid());
            }
            let ip: IpAddr = inner.parse().map_err(|_| invalid())?;
            return Ok(Self::from_ip(ip));
        }

        // bare IPv6 literal, port can't be expressed without brackets
        if let Ok(ip) = input.parse::<IpAddr>() {
            return Ok(Self::from_ip(ip));
        }

        let host = match input.rsplit_once(':') {
            Some((host, port)) if is_port(port) => host,
            Some(_) => return Err(invalid()),
            None => input,
        };

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(Self::from_ip(ip));
        }

        let name = normalize_dns_name(host).ok_or_else(invalid)?;
        Ok(Self {
            key: Arc::from(name),
            ip: None,
        })
    }

    pub fn from_ip(ip: IpAddr) -> Self {
        Self {
            key: Arc::from(ip_literal(ip)),
            ip: Some(ip),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    pub fn is_ip(&self) -> bool {
        self.ip.is_some()
    }

    /// Suffix a one-level wildcard certificate would be indexed under.
    ///
    /// `foo.example.com` yields `.example.com`. Single-label names and IP
    /// literals have none.
    pub fn wildcard_suffix(&self) -> Option<&str> {
        if self.is_ip() {
            return None;
        }
        let dot = self.key.find('.')?;
        let suffix = &self.key[dot..];
        (suffix.len() > 1).then_some(suffix)
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Bracketed literal form of an IP address.
pub fn ip_literal(ip: IpAddr) -> String {
    format!("[{ip}]")
}

/// Lower-case a DNS name, drop the trailing dot and check label syntax.
///
/// Returns `None` for anything that is not a valid hostname, wildcards included.
pub fn normalize_dns_name(name: &str) -> Option<String> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return None;
    }

    let lower = name.to_ascii_lowercase();
    lower.split('.').all(is_valid_label).then_some(lower)
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn is_port(port: &str) -> bool {
    !port.is_empty() && port.len() <= 5 && port.parse::<u16>().is_ok()
}

fn is_port_suffix(tail: &str) -> bool {
    tail.strip_prefix(':').is_some_and(is_port)
}
