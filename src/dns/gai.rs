//! System DNS resolver using getaddrinfo.
//!
//! This resolver uses the operating system's native DNS resolution via
//! `getaddrinfo`, executed in a thread pool to avoid blocking the async runtime.
//!
//! # When to Use
//!
//! - When you need to respect system DNS configuration (/etc/resolv.conf, etc.)
//! - For `myIpAddress()` lookups, which resolve the machine's own host name
//! - As a fallback when hickory-dns is not available

use super::resolve::filter_addrs;
use super::{Addrs, Resolve, ResolveRequest, Resolving};
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use std::net::ToSocketAddrs;

/// System DNS resolver using `getaddrinfo` in a thread pool.
///
/// This resolver wraps the standard library's `ToSocketAddrs` trait and
/// executes resolution in `tokio::task::spawn_blocking`. Every lookup is
/// therefore asynchronous from the caller's point of view.
#[derive(Clone, Debug, Default)]
pub struct GaiResolver;

impl GaiResolver {
    /// Creates a new `GaiResolver`.
    pub fn new() -> Self {
        Self
    }
}

impl Resolve for GaiResolver {
    fn resolve(&self, request: ResolveRequest) -> Resolving {
        Box::pin(async move {
            let host = request.name().as_str().to_string();
            let domain = host.clone();

            let result = tokio::task::spawn_blocking(move || {
                tracing::debug!(host = %host, "resolving via getaddrinfo");
                (host.as_str(), 0u16)
                    .to_socket_addrs()
                    .map(|iter| iter.collect::<Vec<_>>())
            })
            .await;

            // Handle task join error (cancellation, panic)
            let addrs = result
                .map_err(|e| {
                    tracing::error!(error = %e, "DNS resolution task failed");
                    NetError::NameNotResolved
                })?
                .dns_context(&domain)?;

            let addrs = filter_addrs(addrs, &request);
            if addrs.is_empty() {
                tracing::debug!(domain = %domain, family = ?request.family(), "no usable addresses");
                return Err(NetError::NameNotResolvedFor {
                    domain,
                    reason: "No addresses returned by getaddrinfo".into(),
                });
            }

            tracing::debug!(domain = %domain, count = addrs.len(), "DNS resolution complete");
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::AddressFamily;

    #[tokio::test]
    async fn test_gai_resolver_localhost() {
        let resolver = GaiResolver::new();
        let result = resolver.resolve(ResolveRequest::new("localhost").with_port(80)).await;

        // localhost should always resolve
        assert!(result.is_ok());
        let addrs: Vec<_> = result.unwrap().collect();
        assert!(!addrs.is_empty());
        assert!(addrs.iter().all(|a| a.port() == 80));
    }

    #[tokio::test]
    async fn test_gai_resolver_ipv4_literal() {
        let resolver = GaiResolver::new();
        let addrs: Vec<_> = resolver
            .resolve(ResolveRequest::new("127.0.0.1").with_family(AddressFamily::Ipv4))
            .await
            .unwrap()
            .collect();

        assert_eq!(addrs.len(), 1);
        assert!(addrs[0].is_ipv4());
    }

    #[tokio::test]
    async fn test_gai_resolver_family_filter_empty() {
        let resolver = GaiResolver::new();
        let result = resolver
            .resolve(ResolveRequest::new("127.0.0.1").with_family(AddressFamily::Ipv6))
            .await;

        assert!(matches!(result, Err(NetError::NameNotResolvedFor { .. })));
    }
}
