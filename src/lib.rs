//! # pacresolver
//!
//! A Chromium-inspired tracing PAC resolver for Rust.
//!
//! Proxy auto-config scripts call `dnsResolve()` and `myIpAddress()`
//! synchronously. Running them on a thread that blocks on every lookup
//! ties the thread up for as long as DNS takes. `pacresolver` instead runs
//! the script speculatively: when it needs an answer that is not known
//! yet, the attempt is abandoned, the lookup is issued asynchronously, and
//! the script is re-run once the answer is cached.
//!
//! ## Features
//!
//! - **Tracing execution**: abandon/restart with a per-request DNS cache
//! - **Blocking fallback**: for scripts that are not deterministic
//! - **Buffered diagnostics**: `alert()` and errors reported once per request
//! - **Pluggable DNS**: system resolver, hickory-dns, static overrides
//! - **Cancellation**: per request, or by dropping the resolver
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pacresolver::dns::HickoryResolver;
//! use pacresolver::proxy::{PacScriptData, TracingProxyResolverFactory};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     // `engine_factory` is your script interpreter binding.
//!     let factory = TracingProxyResolverFactory::new(engine_factory, Arc::new(HickoryResolver::new()));
//!     let resolver = factory.create(PacScriptData::from_utf8(script)).await.unwrap();
//!     let info = resolver.resolve(&"http://example.com/".parse().unwrap()).await.unwrap();
//!     println!("Proxy: {}", info.to_pac_string());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Core types, error codes and the net log
//! - [`dns`] - Host resolution
//! - [`proxy`] - The tracing PAC resolver

pub mod base;
pub mod dns;
pub mod proxy;
