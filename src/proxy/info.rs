//! Proxy decision returned by a PAC script.
//!
//! Mirrors Chromium's `ProxyInfo` / `ProxyServer::FromPacString`: a PAC
//! result such as `"PROXY a:8080; SOCKS5 b:1080; DIRECT"` becomes an
//! ordered fallback list.

use std::fmt;
use url::Url;

/// Proxy protocol of one PAC entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyScheme {
    /// Connect without a proxy.
    Direct,
    /// HTTP proxy (CONNECT for HTTPS)
    Http,
    /// HTTPS proxy (TLS to proxy)
    Https,
    /// SOCKS4 proxy
    Socks4,
    /// SOCKS5 proxy
    Socks5,
    /// QUIC proxy
    Quic,
}

impl ProxyScheme {
    /// Maps a PAC keyword (`PROXY`, `SOCKS5`, ...) to a scheme.
    fn from_pac_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "direct" => Some(ProxyScheme::Direct),
            "proxy" | "http" => Some(ProxyScheme::Http),
            "https" => Some(ProxyScheme::Https),
            "socks" | "socks4" => Some(ProxyScheme::Socks4),
            "socks5" => Some(ProxyScheme::Socks5),
            "quic" => Some(ProxyScheme::Quic),
            _ => None,
        }
    }

    fn pac_keyword(&self) -> &'static str {
        match self {
            ProxyScheme::Direct => "DIRECT",
            ProxyScheme::Http => "PROXY",
            ProxyScheme::Https => "HTTPS",
            ProxyScheme::Socks4 => "SOCKS",
            ProxyScheme::Socks5 => "SOCKS5",
            ProxyScheme::Quic => "QUIC",
        }
    }

    /// Port used when the PAC entry omits one.
    pub fn default_port(&self) -> u16 {
        match self {
            ProxyScheme::Direct => 0,
            ProxyScheme::Http => 80,
            ProxyScheme::Https | ProxyScheme::Quic => 443,
            ProxyScheme::Socks4 | ProxyScheme::Socks5 => 1080,
        }
    }
}

/// One entry of a proxy list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyServer {
    scheme: ProxyScheme,
    host: String,
    port: u16,
}

impl ProxyServer {
    pub fn direct() -> Self {
        Self { scheme: ProxyScheme::Direct, host: String::new(), port: 0 }
    }

    pub fn new(scheme: ProxyScheme, host: impl Into<String>, port: u16) -> Self {
        Self { scheme, host: host.into(), port }
    }

    /// Parses a single PAC entry, e.g. `"PROXY proxy.example:8080"`.
    ///
    /// Returns `None` for unknown keywords or malformed host/port pairs.
    pub fn from_pac_string(entry: &str) -> Option<Self> {
        let mut parts = entry.split_whitespace();
        let scheme = ProxyScheme::from_pac_keyword(parts.next()?)?;

        if scheme == ProxyScheme::Direct {
            return parts.next().is_none().then(Self::direct);
        }

        let host_port = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        // Let the URL parser handle IPv6 brackets and port validation. A
        // non-special scheme keeps explicit ports that match a default.
        let url = Url::parse(&format!("pac://{}", host_port)).ok()?;
        if !url.path().is_empty() || url.query().is_some() || !url.username().is_empty() {
            return None;
        }
        let host = url.host_str().filter(|h| !h.is_empty())?.to_ascii_lowercase();
        let port = url.port().unwrap_or_else(|| scheme.default_port());
        Some(Self { scheme, host, port })
    }

    pub fn scheme(&self) -> ProxyScheme {
        self.scheme
    }

    pub fn is_direct(&self) -> bool {
        self.scheme == ProxyScheme::Direct
    }

    /// Get proxy host and port. `None` for DIRECT.
    pub fn host_port(&self) -> Option<(&str, u16)> {
        (!self.is_direct()).then_some((self.host.as_str(), self.port))
    }
}

impl fmt::Display for ProxyServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_direct() {
            f.write_str("DIRECT")
        } else {
            write!(f, "{} {}:{}", self.scheme.pac_keyword(), self.host, self.port)
        }
    }
}

/// The outcome of running `FindProxyForURL()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyInfo {
    proxies: Vec<ProxyServer>,
}

impl Default for ProxyInfo {
    fn default() -> Self {
        Self::direct()
    }
}

impl ProxyInfo {
    pub fn direct() -> Self {
        Self { proxies: vec![ProxyServer::direct()] }
    }

    /// Builds the list from a PAC result string.
    ///
    /// Entries are `;` separated. Unknown or malformed entries are skipped;
    /// if nothing usable remains the result is DIRECT.
    pub fn from_pac_string(pac_string: &str) -> Self {
        let proxies: Vec<ProxyServer> = pac_string
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                let parsed = ProxyServer::from_pac_string(entry);
                if parsed.is_none() {
                    tracing::debug!(entry = %entry, "skipping malformed PAC entry");
                }
                parsed
            })
            .collect();

        if proxies.is_empty() {
            Self::direct()
        } else {
            Self { proxies }
        }
    }

    /// Replaces the list with the parsed PAC string.
    pub fn use_pac_string(&mut self, pac_string: &str) {
        *self = Self::from_pac_string(pac_string);
    }

    pub fn use_direct(&mut self) {
        *self = Self::direct();
    }

    /// First entry of the fallback list.
    pub fn proxy_server(&self) -> &ProxyServer {
        // The list is never empty.
        &self.proxies[0]
    }

    pub fn is_direct(&self) -> bool {
        self.proxy_server().is_direct()
    }

    pub fn proxy_list(&self) -> &[ProxyServer] {
        &self.proxies
    }

    /// Serializes back to PAC syntax.
    pub fn to_pac_string(&self) -> String {
        self.proxies.iter().map(ToString::to_string).collect::<Vec<_>>().join(";")
    }
}
