//! Async DNS resolver using hickory-dns.
//!
//! This resolver provides fully async DNS resolution with support for:
//! - DNS-over-HTTPS (DoH)
//! - DNS-over-TLS (DoT)
//! - System DNS configuration auto-detection
//! - IPv4 + IPv6 lookup, filtered per request
//!
//! `myIpAddress()` style requests are delegated to [`GaiResolver`], since the
//! machine's own host name is usually only known to the system resolver.

use super::resolve::filter_addrs;
use super::{Addrs, GaiResolver, Resolve, ResolveRequest, Resolving};
use crate::base::neterror::NetError;
use hickory_resolver::{
    config::{LookupIpStrategy, ResolverConfig},
    name_server::TokioConnectionProvider,
    TokioResolver,
};
use std::{net::SocketAddr, sync::LazyLock};

/// Async DNS resolver backed by hickory-dns.
///
/// The underlying resolver is lazily initialized on first use and shared
/// across all instances via a static `LazyLock`.
///
/// # Example
///
/// ```rust,ignore
/// use pacresolver::dns::{HickoryResolver, Resolve, ResolveRequest};
///
/// let resolver = HickoryResolver::new();
/// let addrs = resolver.resolve(ResolveRequest::new("example.com")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct HickoryResolver {
    resolver: &'static LazyLock<TokioResolver>,
    system: GaiResolver,
}

impl HickoryResolver {
    /// Creates a new `HickoryResolver`.
    ///
    /// It will attempt to read system DNS configuration; if that fails,
    /// it falls back to sensible defaults.
    pub fn new() -> Self {
        static RESOLVER: LazyLock<TokioResolver> = LazyLock::new(|| {
            let mut builder = match TokioResolver::builder_tokio() {
                Ok(builder) => {
                    tracing::debug!("Using system DNS configuration");
                    builder
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to read system DNS config, using defaults"
                    );
                    TokioResolver::builder_with_config(
                        ResolverConfig::default(),
                        TokioConnectionProvider::default(),
                    )
                }
            };

            // Both families; requests narrow the result afterwards.
            builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

            builder.build()
        });

        Self {
            resolver: &RESOLVER,
            system: GaiResolver::new(),
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolve for HickoryResolver {
    fn resolve(&self, request: ResolveRequest) -> Resolving {
        if request.is_my_ip_address() {
            return self.system.resolve(request);
        }

        let resolver = self.clone();
        Box::pin(async move {
            let domain = request.name().as_str();
            tracing::debug!(domain = %domain, priority = ?request.priority(), "resolving via hickory-dns");

            let lookup = resolver.resolver.lookup_ip(domain).await.map_err(|e| {
                tracing::debug!(domain = %domain, error = %e, "hickory-dns lookup failed");
                NetError::NameNotResolvedFor {
                    domain: domain.to_string(),
                    reason: e.to_string(),
                }
            })?;

            let addrs: Vec<SocketAddr> =
                filter_addrs(lookup.iter().map(|ip| SocketAddr::new(ip, 0)), &request);

            if addrs.is_empty() {
                return Err(NetError::NameNotResolvedFor {
                    domain: domain.to_string(),
                    reason: "No addresses returned".into(),
                });
            }

            tracing::debug!(domain = %domain, count = addrs.len(), "hickory-dns resolution complete");
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}
