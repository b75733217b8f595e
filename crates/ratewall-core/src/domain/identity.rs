use std::fmt;
use std::net::SocketAddr;

/// Header carrying a client's API key. Its value is used verbatim.
pub const API_KEY_HEADER: &str = "API_KEY";

const BLOCK_SUFFIX: &str = ":block";

/// The subject a request is counted against.
///
/// A request carrying an API key is always counted against the key, even when
/// its address is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Client address with the port stripped.
    Ip(String),
    /// Raw `API_KEY` header value.
    Token(String),
}

impl Identity {
    /// Derive the identity from the connection's remote address and the
    /// `API_KEY` header value, if any. An empty key counts as no key.
    pub fn derive(remote_addr: &str, api_key: Option<&str>) -> Self {
        match api_key {
            Some(token) if !token.is_empty() => Identity::Token(token.to_string()),
            _ => Identity::Ip(host_of(remote_addr).into_owned()),
        }
    }

    /// Whether this identity uses the token threshold.
    pub fn is_token(&self) -> bool {
        matches!(self, Identity::Token(_))
    }

    /// Store key of the request counter.
    pub fn key(&self) -> String {
        match self {
            Identity::Ip(host) => format!("ip:{host}"),
            Identity::Token(token) => format!("token:{token}"),
        }
    }

    /// Store key of the block flag.
    pub fn block_key(&self) -> String {
        let mut key = self.key();
        key.push_str(BLOCK_SUFFIX);
        key
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Ip(host) => write!(f, "ip {host}"),
            // Tokens are credentials; keep them out of logs.
            Identity::Token(_) => write!(f, "api key"),
        }
    }
}

/// Strip the port from a `host:port` address. Anything that does not split
/// cleanly is returned untouched.
fn host_of(remote_addr: &str) -> std::borrow::Cow<'_, str> {
    if let Ok(addr) = remote_addr.parse::<SocketAddr>() {
        return addr.ip().to_string().into();
    }

    match remote_addr.rsplit_once(':') {
        Some((host, _port)) if !host.contains(':') && !host.contains('[') => host.into(),
        _ => remote_addr.into(),
    }
}
