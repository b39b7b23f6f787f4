//! DNS Resolution Module
//!
//! Provides pluggable DNS resolution with support for:
//! - System resolver (getaddrinfo via thread pool)
//! - Async hickory-dns resolver (DoH/DoT capable)
//! - Hostname-to-IP override mechanism
//!
//! # Architecture
//!
//! This module mirrors Chromium's `HostResolver` concept. The `Resolve`
//! trait is the core abstraction; the PAC tracing resolver drives it and
//! classifies each request as synchronous (future ready on first poll) or
//! asynchronous.
//!
//! # Example
//!
//! ```rust,ignore
//! use pacresolver::dns::{HickoryResolver, Resolve, ResolveRequest};
//!
//! let resolver = HickoryResolver::new();
//! let addrs = resolver.resolve(ResolveRequest::new("example.com")).await?;
//! for addr in addrs {
//!     println!("Resolved: {}", addr);
//! }
//! ```

mod gai;
mod hickory;
mod resolve;

pub use gai::GaiResolver;
pub use hickory::HickoryResolver;
pub use resolve::{
    AddressFamily, Addrs, DnsResolverWithOverrides, Name, Resolve, ResolveRequest, Resolving,
};
