//! Seams between the tracing resolver and the script interpreter.
//!
//! The interpreter itself lives outside this crate. It implements
//! [`ProxyResolverEngineFactory`] / [`ProxyResolverEngine`] and calls back
//! through [`JsBindings`] whenever the script uses `dnsResolve()`,
//! `myIpAddress()`, `alert()` or raises an error.

use crate::base::neterror::NetError;
use crate::proxy::info::ProxyInfo;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// The DNS-flavoured PAC functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResolveDnsOperation {
    /// `dnsResolve(host)`: one IPv4 address.
    DnsResolve,
    /// `dnsResolveEx(host)`: every address, `;` separated.
    DnsResolveEx,
    /// `myIpAddress()`: one IPv4 address of this machine.
    MyIpAddress,
    /// `myIpAddressEx()`: every address of this machine.
    MyIpAddressEx,
}

impl ResolveDnsOperation {
    pub fn is_my_ip_address(&self) -> bool {
        matches!(self, Self::MyIpAddress | Self::MyIpAddressEx)
    }

    /// The `Ex` forms return the whole address list, IPv6 included.
    pub fn is_ex(&self) -> bool {
        matches!(self, Self::DnsResolveEx | Self::MyIpAddressEx)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DnsResolve => "dnsResolve",
            Self::DnsResolveEx => "dnsResolveEx",
            Self::MyIpAddress => "myIpAddress",
            Self::MyIpAddressEx => "myIpAddressEx",
        }
    }
}

impl fmt::Display for ResolveDnsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine should do after a DNS hook call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsHookOutcome {
    /// Keep running. `Some` carries the answer; `None` means the lookup
    /// failed and the script should see its failure value.
    Continue(Option<String>),
    /// The attempt was abandoned on a missing DNS dependency. Stop the
    /// script; it will be re-run once the answer is cached.
    Abandon,
    /// The request was cancelled. Stop the script.
    Terminate,
}

impl DnsHookOutcome {
    /// Whether the engine must stop executing the script.
    pub fn should_terminate(&self) -> bool {
        !matches!(self, DnsHookOutcome::Continue(_))
    }

    /// The resolved value, if any.
    pub fn value(&self) -> Option<&str> {
        match self {
            DnsHookOutcome::Continue(value) => value.as_deref(),
            _ => None,
        }
    }
}

/// Callbacks available to a running PAC script.
pub trait JsBindings {
    /// Handles `dnsResolve()` and friends.
    fn resolve_dns(&mut self, host: &str, op: ResolveDnsOperation) -> DnsHookOutcome;

    /// Handles `alert(message)`.
    fn alert(&mut self, message: &str);

    /// Handles a script error, with the line number when known.
    fn on_error(&mut self, line_number: Option<u32>, message: &str);
}

/// PAC script source text.
#[derive(Clone, PartialEq, Eq)]
pub struct PacScriptData {
    text: Arc<str>,
}

impl PacScriptData {
    pub fn from_utf8(text: impl Into<Arc<str>>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl fmt::Debug for PacScriptData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacScriptData").field("len", &self.text.len()).finish()
    }
}

/// A loaded PAC script, ready to evaluate `FindProxyForURL()`.
///
/// Evaluations only ever run on the resolver's worker thread, one at a
/// time, and may be repeated for the same URL.
pub trait ProxyResolverEngine: Send + Sync {
    fn get_proxy_for_url(
        &self,
        url: &Url,
        bindings: &mut dyn JsBindings,
    ) -> Result<ProxyInfo, NetError>;
}

/// Loads PAC scripts into engines. Top-level script code may already call
/// the bindings, so creation runs through the same DNS machinery.
pub trait ProxyResolverEngineFactory: Send + Sync {
    fn create(
        &self,
        script: &PacScriptData,
        bindings: &mut dyn JsBindings,
    ) -> Result<Arc<dyn ProxyResolverEngine>, NetError>;
}

/// Receives script errors (Chromium's `ProxyResolverErrorObserver`).
pub trait PacErrorObserver: Send + Sync {
    fn on_pac_script_error(&self, line_number: Option<u32>, message: &str);
}
