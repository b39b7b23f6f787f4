//! Shared fixtures: a scripted PAC engine and a controllable host resolver.

#![allow(dead_code)]

use pacresolver::base::neterror::NetError;
use pacresolver::dns::{Addrs, Resolve, ResolveRequest, Resolving};
use pacresolver::proxy::{
    JsBindings, PacErrorObserver, PacScriptData, ProxyInfo, ProxyResolverEngine,
    ProxyResolverEngineFactory, ResolveDnsOperation,
};

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub type ScriptFn =
    dyn Fn(&Url, &mut dyn JsBindings) -> Result<ProxyInfo, NetError> + Send + Sync;
pub type InitFn = dyn Fn(&mut dyn JsBindings) -> Result<(), NetError> + Send + Sync;

/// Calls `dnsResolve(host)`. Stops the "script" if the hook says so.
pub fn dns_resolve(bindings: &mut dyn JsBindings, host: &str) -> Result<Option<String>, NetError> {
    resolve_op(bindings, host, ResolveDnsOperation::DnsResolve)
}

pub fn resolve_op(
    bindings: &mut dyn JsBindings,
    host: &str,
    op: ResolveDnsOperation,
) -> Result<Option<String>, NetError> {
    let outcome = bindings.resolve_dns(host, op);
    if outcome.should_terminate() {
        return Err(NetError::PacScriptTerminated);
    }
    Ok(outcome.value().map(str::to_string))
}

/// Engine whose `FindProxyForURL()` is a Rust closure.
pub struct ScriptedEngine {
    script: Arc<ScriptFn>,
    runs: Arc<AtomicUsize>,
}

impl ProxyResolverEngine for ScriptedEngine {
    fn get_proxy_for_url(
        &self,
        url: &Url,
        bindings: &mut dyn JsBindings,
    ) -> Result<ProxyInfo, NetError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        (self.script)(url, bindings)
    }
}

pub struct ScriptedEngineFactory {
    init: Arc<InitFn>,
    script: Arc<ScriptFn>,
    init_runs: AtomicUsize,
    runs: Arc<AtomicUsize>,
}

impl ScriptedEngineFactory {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Url, &mut dyn JsBindings) -> Result<ProxyInfo, NetError> + Send + Sync + 'static,
    {
        Self {
            init: Arc::new(|_| Ok(())),
            script: Arc::new(script),
            init_runs: AtomicUsize::new(0),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Top-level script code, run when the engine is created.
    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut dyn JsBindings) -> Result<(), NetError> + Send + Sync + 'static,
    {
        self.init = Arc::new(init);
        self
    }

    /// `FindProxyForURL()` evaluations across all engines.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn init_runs(&self) -> usize {
        self.init_runs.load(Ordering::SeqCst)
    }
}

impl ProxyResolverEngineFactory for ScriptedEngineFactory {
    fn create(
        &self,
        _script: &PacScriptData,
        bindings: &mut dyn JsBindings,
    ) -> Result<Arc<dyn ProxyResolverEngine>, NetError> {
        self.init_runs.fetch_add(1, Ordering::SeqCst);
        (self.init)(bindings)?;
        Ok(Arc::new(ScriptedEngine {
            script: Arc::clone(&self.script),
            runs: Arc::clone(&self.runs),
        }))
    }
}

/// Host resolver with canned answers.
///
/// Answers are asynchronous unless `synchronous()` is set. Hosts marked
/// hanging never complete.
#[derive(Default)]
pub struct MockHostResolver {
    answers: HashMap<String, Vec<IpAddr>>,
    default_answer: Option<IpAddr>,
    hanging: HashSet<String>,
    synchronous: bool,
    requests: Mutex<Vec<ResolveRequest>>,
    cancelled: Arc<AtomicUsize>,
}

impl MockHostResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, host: &str, ip: &str) -> Self {
        let ip: IpAddr = ip.parse().unwrap();
        self.answers.entry(host.to_string()).or_default().push(ip);
        self
    }

    /// Answer for hosts without a canned answer.
    pub fn with_default(mut self, ip: &str) -> Self {
        self.default_answer = Some(ip.parse().unwrap());
        self
    }

    pub fn with_hanging(mut self, host: &str) -> Self {
        self.hanging.insert(host.to_string());
        self
    }

    pub fn synchronous(mut self) -> Self {
        self.synchronous = true;
        self
    }

    pub fn requests(&self) -> Vec<ResolveRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_hosts(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.name().as_str().to_string()).collect()
    }

    /// Requests dropped before completing.
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn answer(&self, request: &ResolveRequest) -> Result<Vec<SocketAddr>, NetError> {
        let host = request.name().as_str();
        let ips = match self.answers.get(host) {
            Some(ips) => ips.clone(),
            None => self.default_answer.into_iter().collect(),
        };
        let addrs: Vec<SocketAddr> = ips
            .into_iter()
            .filter(|ip| request.family().accepts(ip))
            .map(|ip| SocketAddr::new(ip, request.port()))
            .collect();
        if addrs.is_empty() {
            Err(NetError::NameNotResolved)
        } else {
            Ok(addrs)
        }
    }
}

struct CancelRecorder {
    armed: bool,
    cancelled: Arc<AtomicUsize>,
}

impl Drop for CancelRecorder {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Resolve for MockHostResolver {
    fn resolve(&self, request: ResolveRequest) -> Resolving {
        self.requests.lock().unwrap().push(request.clone());

        let hanging = self.hanging.contains(request.name().as_str());
        let result = self.answer(&request);

        if self.synchronous && !hanging {
            let result = result.map(|addrs| Box::new(addrs.into_iter()) as Addrs);
            return Box::pin(std::future::ready(result));
        }

        let cancelled = Arc::clone(&self.cancelled);
        Box::pin(async move {
            let mut recorder = CancelRecorder { armed: true, cancelled };
            if hanging {
                futures::future::pending::<()>().await;
            }
            tokio::task::yield_now().await;
            recorder.armed = false;
            result.map(|addrs| Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

/// Collects script errors.
#[derive(Default)]
pub struct RecordingErrorObserver {
    errors: Mutex<Vec<(Option<u32>, String)>>,
}

impl RecordingErrorObserver {
    pub fn errors(&self) -> Vec<(Option<u32>, String)> {
        self.errors.lock().unwrap().clone()
    }
}

impl PacErrorObserver for RecordingErrorObserver {
    fn on_pac_script_error(&self, line_number: Option<u32>, message: &str) {
        self.errors.lock().unwrap().push((line_number, message.to_string()));
    }
}

pub fn script() -> PacScriptData {
    PacScriptData::from_utf8("function FindProxyForURL(url, host) { return 'DIRECT'; }")
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
