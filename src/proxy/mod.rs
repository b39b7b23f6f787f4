//! Tracing PAC resolver.
//!
//! Evaluates proxy auto-config scripts on a dedicated worker thread
//! without blocking it on DNS, mirroring Chromium's `net/proxy_resolution/`:
//! - [`factory`]: loads scripts into [`TracingProxyResolver`]s
//! - [`resolver`]: per-script request manager
//! - [`job`]: speculative execution with abandon and restart
//! - [`dnscache`]: per-job DNS answers replayed across attempts
//! - [`alerts`]: buffered `alert()` and error output
//! - [`engine`]: seams to the script interpreter
//! - [`info`]: PAC result strings
//! - [`worker`]: the worker thread

pub mod alerts;
pub mod config;
pub mod dnscache;
pub mod engine;
pub mod factory;
pub mod info;
pub mod job;
pub mod resolver;
pub mod worker;

pub use config::TracingResolverConfig;
pub use engine::{
    DnsHookOutcome, JsBindings, PacErrorObserver, PacScriptData, ProxyResolverEngine,
    ProxyResolverEngineFactory, ResolveDnsOperation,
};
pub use factory::{CreateRequest, PacErrorObserverFactory, TracingProxyResolverFactory};
pub use info::{ProxyInfo, ProxyScheme, ProxyServer};
pub use job::{LoadStateChangedCallback, RequestHandle};
pub use resolver::TracingProxyResolver;
