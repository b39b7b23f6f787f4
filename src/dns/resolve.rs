//! Core DNS resolution types and traits.
//!
//! This module defines the `Resolve` trait and supporting types that form
//! the foundation of the DNS abstraction layer.

use crate::base::neterror::NetError;
use crate::base::priority::RequestPriority;
use std::{
    borrow::Cow,
    collections::HashMap,
    fmt,
    future::Future,
    net::{IpAddr, SocketAddr},
    pin::Pin,
    sync::Arc,
};

/// A domain name to resolve into IP addresses.
///
/// This is a lightweight wrapper around a hostname string that provides
/// a type-safe way to pass domain names to resolvers.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    /// Creates a new [`Name`] from any string-like type.
    #[inline]
    pub fn new(host: impl Into<Box<str>>) -> Self {
        Self { host: host.into() }
    }

    /// View the hostname as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Restricts which address families a lookup may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressFamily {
    #[default]
    Unspecified,
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Whether `ip` belongs to this family.
    pub fn accepts(&self, ip: &IpAddr) -> bool {
        match self {
            AddressFamily::Unspecified => true,
            AddressFamily::Ipv4 => ip.is_ipv4(),
            AddressFamily::Ipv6 => ip.is_ipv6(),
        }
    }
}

/// A single host resolution request (Chromium's `HostResolver::RequestInfo`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolveRequest {
    name: Name,
    port: u16,
    family: AddressFamily,
    priority: RequestPriority,
    is_my_ip_address: bool,
}

impl ResolveRequest {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            port: 0,
            family: AddressFamily::Unspecified,
            priority: RequestPriority::default(),
            is_my_ip_address: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_priority(mut self, priority: RequestPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Flags the request as a lookup of the local machine's own addresses.
    pub fn my_ip_address(mut self) -> Self {
        self.is_my_ip_address = true;
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn priority(&self) -> RequestPriority {
        self.priority
    }

    pub fn is_my_ip_address(&self) -> bool {
        self.is_my_ip_address
    }
}

impl From<Name> for ResolveRequest {
    fn from(name: Name) -> Self {
        ResolveRequest::new(name)
    }
}

impl From<&str> for ResolveRequest {
    fn from(host: &str) -> Self {
        ResolveRequest::new(host)
    }
}

/// Alias for an `Iterator` trait object over `SocketAddr`.
pub type Addrs = Box<dyn Iterator<Item = SocketAddr> + Send>;

/// Alias for the `Future` type returned by a DNS resolver.
pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, NetError>> + Send>>;

/// Trait for DNS resolution.
///
/// This is the core abstraction for DNS resolvers, equivalent to
/// Chromium's `HostResolver`. Implementations must be thread-safe.
///
/// # Design Notes
///
/// - A returned future that is ready on its first poll is treated by
///   callers as a synchronous completion (e.g. a cache or override hit).
/// - Dropping the future cancels the request.
/// - Uses `&self` for concurrent resolution without mutable access.
pub trait Resolve: Send + Sync {
    /// Resolves a request to socket addresses.
    ///
    /// The returned addresses carry the request's port and must respect
    /// its address family.
    fn resolve(&self, request: ResolveRequest) -> Resolving;
}

/// Blanket implementation for Arc-wrapped resolvers.
impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, request: ResolveRequest) -> Resolving {
        (**self).resolve(request)
    }
}

/// DNS resolver wrapper that supports hostname overrides.
///
/// This resolver first checks a map of hostname-to-address overrides before
/// falling back to the underlying resolver. Override hits complete
/// synchronously, which makes them free for PAC scripts.
///
/// # Example
///
/// ```rust,ignore
/// use pacresolver::dns::{DnsResolverWithOverrides, HickoryResolver};
/// use std::collections::HashMap;
///
/// let mut overrides = HashMap::new();
/// overrides.insert("wpad.local".into(), vec!["10.0.0.1:0".parse().unwrap()]);
///
/// let resolver = DnsResolverWithOverrides::new(Arc::new(HickoryResolver::new()), overrides);
/// ```
pub struct DnsResolverWithOverrides {
    inner: Arc<dyn Resolve>,
    overrides: Arc<HashMap<Cow<'static, str>, Vec<SocketAddr>>>,
}

impl DnsResolverWithOverrides {
    /// Creates a new resolver with the given overrides.
    ///
    /// # Arguments
    ///
    /// * `inner` - The fallback resolver for non-overridden hostnames.
    /// * `overrides` - Map of hostnames to their resolved addresses.
    pub fn new(
        inner: Arc<dyn Resolve>,
        overrides: HashMap<Cow<'static, str>, Vec<SocketAddr>>,
    ) -> Self {
        Self {
            inner,
            overrides: Arc::new(overrides),
        }
    }

    /// Returns the number of configured overrides.
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

impl Resolve for DnsResolverWithOverrides {
    fn resolve(&self, request: ResolveRequest) -> Resolving {
        if let Some(addrs) = self.overrides.get(request.name().as_str()) {
            let family = request.family();
            let port = request.port();
            let addrs: Vec<SocketAddr> = addrs
                .iter()
                .filter(|a| family.accepts(&a.ip()))
                .map(|a| SocketAddr::new(a.ip(), port))
                .collect();
            if addrs.is_empty() {
                let domain = request.name().to_string();
                return Box::pin(std::future::ready(Err(NetError::NameNotResolvedFor {
                    domain,
                    reason: "no override for requested address family".into(),
                })));
            }
            let addrs: Addrs = Box::new(addrs.into_iter());
            return Box::pin(std::future::ready(Ok(addrs)));
        }
        self.inner.resolve(request)
    }
}

impl fmt::Debug for DnsResolverWithOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsResolverWithOverrides")
            .field("override_count", &self.overrides.len())
            .finish_non_exhaustive()
    }
}

/// Keeps addresses of the requested family and stamps the request port.
pub(crate) fn filter_addrs(
    addrs: impl IntoIterator<Item = SocketAddr>,
    request: &ResolveRequest,
) -> Vec<SocketAddr> {
    addrs
        .into_iter()
        .filter(|a| request.family().accepts(&a.ip()))
        .map(|a| SocketAddr::new(a.ip(), request.port()))
        .collect()
}
