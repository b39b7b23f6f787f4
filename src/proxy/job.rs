//! The speculative-execution coordinator behind the tracing resolver.
//!
//! PAC scripts are modelled as deterministic functions of the URL. A job
//! runs the script on the worker thread; the first time the script asks
//! for a DNS answer that is not cached and cannot be produced
//! synchronously, the attempt is abandoned and re-run from scratch once the
//! answer arrives. Each restart replays earlier answers from the job's
//! local cache, so it gets at least one lookup further.
//!
//! A job touches two contexts:
//! - the *origin* (the tokio runtime that started it) owns the caller's
//!   callback and talks to the host resolver;
//! - the *worker* (the resolver's dedicated thread) runs the script.
//!
//! The worker only blocks right after handing a lookup to the origin,
//! until it learns whether the lookup completed synchronously. In blocking
//! mode (script creation, or after the script misbehaved under tracing) it
//! waits for the full answer instead.

use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::base::netlog::{
    alert_params, error_params, BoundNetLog, NetLog, NetLogEntry, NetLogEventType, NetLogSource,
};
use crate::dns::Resolve;
use crate::proxy::alerts::{AlertErrorBuffer, AlertKind, AlertOrError};
use crate::proxy::config::TracingResolverConfig;
use crate::proxy::dnscache::{make_request, LocalDnsCache};
use crate::proxy::engine::{
    DnsHookOutcome, JsBindings, PacErrorObserver, PacScriptData, ProxyResolverEngine,
    ProxyResolverEngineFactory, ResolveDnsOperation,
};
use crate::proxy::info::ProxyInfo;
use crate::proxy::worker::WorkerHandle;
use dashmap::DashMap;
use futures::FutureExt;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use url::Url;

/// Identifies an outstanding request on a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle(u64);

impl RequestHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Invoked on the origin context whenever a request's load state changes.
pub type LoadStateChangedCallback = Arc<dyn Fn(RequestHandle, LoadState) + Send + Sync>;

pub(crate) type JobCallback = Box<dyn FnOnce(Result<JobOutput, NetError>) + Send + 'static>;

pub(crate) enum JobOutput {
    Engine(Arc<dyn ProxyResolverEngine>),
    Proxy(ProxyInfo),
}

pub(crate) enum Operation {
    CreateEngine {
        script: PacScriptData,
        factory: Arc<dyn ProxyResolverEngineFactory>,
    },
    GetProxyForUrl {
        url: Url,
        engine: Arc<dyn ProxyResolverEngine>,
    },
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::CreateEngine { .. } => "create_engine",
            Operation::GetProxyForUrl { .. } => "get_proxy_for_url",
        }
    }
}

/// State shared by a resolver and all of its jobs.
pub(crate) struct JobParams {
    pub(crate) worker: WorkerHandle,
    pub(crate) origin: tokio::runtime::Handle,
    pub(crate) host_resolver: Arc<dyn Resolve>,
    pub(crate) error_observer: Option<Arc<dyn PacErrorObserver>>,
    pub(crate) net_log: Option<Arc<dyn NetLog>>,
    pub(crate) on_load_state_changed: Option<LoadStateChangedCallback>,
    pub(crate) config: TracingResolverConfig,
    /// Jobs with outstanding work. Removing an entry releases the job.
    pub(crate) jobs: DashMap<u64, Arc<Job>>,
    outstanding_callbacks: AtomicUsize,
    next_id: AtomicU64,
}

impl JobParams {
    pub(crate) fn new(
        worker: WorkerHandle,
        origin: tokio::runtime::Handle,
        host_resolver: Arc<dyn Resolve>,
        error_observer: Option<Arc<dyn PacErrorObserver>>,
        net_log: Option<Arc<dyn NetLog>>,
        on_load_state_changed: Option<LoadStateChangedCallback>,
        config: TracingResolverConfig,
    ) -> Self {
        Self {
            worker,
            origin,
            host_resolver,
            error_observer,
            net_log,
            on_load_state_changed,
            config,
            jobs: DashMap::new(),
            outstanding_callbacks: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn outstanding_callbacks(&self) -> usize {
        self.outstanding_callbacks.load(Ordering::Acquire)
    }

    /// Cancels the job behind `handle`, if it is still outstanding.
    pub(crate) fn cancel(&self, handle: RequestHandle) {
        if let Some((_, job)) = self.jobs.remove(&handle.0) {
            job.cancel();
        }
    }

    pub(crate) fn cancel_all(&self) {
        let jobs: Vec<Arc<Job>> = self.jobs.iter().map(|entry| Arc::clone(entry.value())).collect();
        for job in jobs {
            job.cancel();
        }
    }

    pub(crate) fn load_state(&self, handle: RequestHandle) -> Option<LoadState> {
        self.jobs.get(&handle.0).map(|job| job.load_state())
    }
}

/// A lookup handed from the worker to the origin.
#[derive(Debug, Clone)]
struct PendingDnsRequest {
    host: String,
    op: ResolveDnsOperation,
}

#[derive(Default)]
struct JobState {
    callback: Option<JobCallback>,
    /// Wakes the worker blocked in `post_dns_operation_and_wait`. Tagged
    /// with the wait it belongs to.
    signal: Option<(u64, oneshot::Sender<bool>)>,
    /// Cancels the outstanding asynchronous resolver request.
    in_flight: Option<oneshot::Sender<()>>,
}

pub(crate) struct Job {
    id: u64,
    params: Arc<JobParams>,
    operation: Operation,
    bound_net_log: BoundNetLog,
    cancelled: AtomicBool,
    /// Set once at start for script creation, or by the worker when the
    /// job falls back to blocking mode. Never cleared.
    blocking_dns: AtomicBool,
    /// DNS calls made by the previous non-blocking attempt. Worker only.
    last_num_dns: AtomicUsize,
    attempts: AtomicUsize,
    next_wait: AtomicU64,
    /// Written on the origin, read on the worker.
    dns_cache: Mutex<LocalDnsCache>,
    state: Mutex<JobState>,
}

impl Job {
    /// Registers a job and posts its first attempt to the worker.
    ///
    /// Script creation runs in blocking mode: nothing else can proceed
    /// until the engine exists, so tracing buys nothing. URL resolution
    /// starts non-blocking.
    pub(crate) fn start(
        params: &Arc<JobParams>,
        operation: Operation,
        request_net_log: Option<Arc<dyn NetLog>>,
        callback: JobCallback,
    ) -> Result<RequestHandle, NetError> {
        let id = params.next_id.fetch_add(1, Ordering::Relaxed);
        let blocking = matches!(operation, Operation::CreateEngine { .. });
        let bound_net_log = match request_net_log {
            Some(log) => BoundNetLog::new(log, id),
            None => BoundNetLog::none(),
        };

        let job = Arc::new(Job::new(id, Arc::clone(params), operation, bound_net_log, blocking));

        job.set_callback(callback);
        params.jobs.insert(id, Arc::clone(&job));

        tracing::debug!(job = id, operation = job.operation.name(), blocking, "starting PAC job");

        let worker_job = Arc::clone(&job);
        let posted = params.worker.post_task(move || {
            if blocking {
                worker_job.execute_blocking();
            } else {
                worker_job.execute_non_blocking();
            }
        });
        if let Err(e) = posted {
            params.cancel(RequestHandle(id));
            return Err(e);
        }

        Ok(RequestHandle(id))
    }

    fn new(
        id: u64,
        params: Arc<JobParams>,
        operation: Operation,
        bound_net_log: BoundNetLog,
        blocking: bool,
    ) -> Self {
        Self {
            id,
            params,
            operation,
            bound_net_log,
            cancelled: AtomicBool::new(false),
            blocking_dns: AtomicBool::new(blocking),
            last_num_dns: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
            next_wait: AtomicU64::new(0),
            dns_cache: Mutex::new(LocalDnsCache::new()),
            state: Mutex::new(JobState::default()),
        }
    }

    pub(crate) fn handle(&self) -> RequestHandle {
        RequestHandle(self.id)
    }

    fn lock_state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cache(&self) -> MutexGuard<'_, LocalDnsCache> {
        self.dns_cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn is_blocking(&self) -> bool {
        self.blocking_dns.load(Ordering::Acquire)
    }

    fn set_callback(&self, callback: JobCallback) {
        self.params.outstanding_callbacks.fetch_add(1, Ordering::AcqRel);
        self.lock_state().callback = Some(callback);
    }

    /// Drops the callback without running it and unregisters the job.
    fn release_callback(&self, callback: Option<JobCallback>) -> Option<JobCallback> {
        if callback.is_some() {
            self.params.outstanding_callbacks.fetch_sub(1, Ordering::AcqRel);
        }
        self.params.jobs.remove(&self.id);
        callback
    }

    /// Stops the job. Idempotent.
    ///
    /// The callback is released without being invoked, an outstanding DNS
    /// request is cancelled, and a worker blocked on DNS is woken.
    pub(crate) fn cancel(&self) {
        let (callback, signal, in_flight) = {
            let mut state = self.lock_state();
            if self.cancelled.swap(true, Ordering::AcqRel) {
                return;
            }
            (state.callback.take(), state.signal.take(), state.in_flight.take())
        };

        tracing::debug!(job = self.id, "cancelling PAC job");
        drop(self.release_callback(callback));

        if let Some(in_flight) = in_flight {
            let _ = in_flight.send(());
        }
        // Dropping the sender releases the worker.
        drop(signal);
    }

    pub(crate) fn load_state(&self) -> LoadState {
        if self.lock_state().in_flight.is_some() {
            LoadState::ResolvingHostInPacFile
        } else {
            LoadState::ResolvingProxyForUrl
        }
    }

    // -----------------------------------------------------------------
    // Worker side
    // -----------------------------------------------------------------

    fn execute_blocking(self: &Arc<Self>) {
        if self.is_cancelled() {
            return;
        }

        let attempt_number = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(job = self.id, attempt = attempt_number, "blocking attempt");

        let mut attempt = Attempt::new(self, true);
        let result = self.execute_proxy_resolver(&mut attempt);
        self.notify_caller(result);
    }

    fn execute_non_blocking(self: &Arc<Self>) {
        if self.is_cancelled() {
            return;
        }

        let attempt_number = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(job = self.id, attempt = attempt_number, "non-blocking attempt");

        let mut attempt = Attempt::new(self, false);
        let result = self.execute_proxy_resolver(&mut attempt);

        if attempt.restart_with_blocking_dns {
            tracing::debug!(job = self.id, "falling back to blocking DNS");
            self.blocking_dns.store(true, Ordering::Release);
            self.execute_blocking();
            return;
        }

        if attempt.abandoned {
            return;
        }

        attempt.alerts.flush_to(|entry| self.dispatch_alert_or_error(entry));
        self.notify_caller(result);
    }

    fn execute_proxy_resolver(
        &self,
        bindings: &mut dyn JsBindings,
    ) -> Result<JobOutput, NetError> {
        match &self.operation {
            Operation::CreateEngine { script, factory } => {
                factory.create(script, bindings).map(JobOutput::Engine)
            }
            Operation::GetProxyForUrl { url, engine } => {
                engine.get_proxy_for_url(url, bindings).map(JobOutput::Proxy)
            }
        }
    }

    fn lookup_cached(&self, host: &str, op: ResolveDnsOperation) -> Option<String> {
        self.lock_cache().lookup(host, op).map(str::to_string)
    }

    fn cache_is_full(&self) -> bool {
        self.lock_cache().len() >= self.params.config.max_unique_dns_per_exec
    }

    /// Hands a lookup to the origin and blocks until told whether it
    /// completed synchronously. Blocking-mode jobs are only woken once the
    /// answer is cached.
    ///
    /// Returns `None` if the job was cancelled meanwhile.
    fn post_dns_operation_and_wait(
        self: &Arc<Self>,
        host: &str,
        op: ResolveDnsOperation,
    ) -> Option<bool> {
        let wait_id = self.next_wait.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.lock_state();
            if self.is_cancelled() {
                return None;
            }
            state.signal = Some((wait_id, tx));
        }

        let request = PendingDnsRequest { host: host.to_string(), op };
        let job = Arc::clone(self);
        self.params.origin.spawn(async move {
            job.do_dns_operation(wait_id, request).await;
        });

        let completed_synchronously = rx.blocking_recv().ok()?;
        if self.is_cancelled() {
            return None;
        }
        Some(completed_synchronously)
    }

    // -----------------------------------------------------------------
    // Origin side
    // -----------------------------------------------------------------

    fn signal_worker(&self, wait_id: u64, completed_synchronously: bool) {
        let signal = {
            let mut state = self.lock_state();
            match state.signal.take() {
                Some((id, tx)) if id == wait_id => Some(tx),
                other => {
                    state.signal = other;
                    None
                }
            }
        };
        if let Some(tx) = signal {
            let _ = tx.send(completed_synchronously);
        }
    }

    /// Releases the worker with no answer if `wait_id` was never signalled.
    fn abandon_wait(&self, wait_id: u64) {
        let mut state = self.lock_state();
        if matches!(state.signal, Some((id, _)) if id == wait_id) {
            state.signal = None;
        }
    }

    async fn do_dns_operation(self: Arc<Self>, wait_id: u64, request: PendingDnsRequest) {
        let _guard = WaitGuard { job: &self, wait_id };

        if self.is_cancelled() {
            return;
        }

        let blocking = self.is_blocking();
        let dns_request = make_request(&request.host, request.op, self.params.config.dns_priority);
        let mut resolving = self.params.host_resolver.resolve(dns_request);

        if let Some(result) = (&mut resolving).now_or_never() {
            self.on_dns_operation_complete(&request, result, true);
            self.signal_worker(wait_id, true);
            return;
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        {
            let mut state = self.lock_state();
            if self.is_cancelled() {
                // Dropping `resolving` cancels the request.
                return;
            }
            state.in_flight = Some(cancel_tx);
        }

        tracing::trace!(job = self.id, host = %request.host, op = %request.op, "DNS request pending");
        self.notify_load_state(LoadState::ResolvingHostInPacFile);

        if !blocking {
            // The worker abandons the attempt; a restart is posted once
            // the answer is cached.
            self.signal_worker(wait_id, false);
        }

        tokio::select! {
            result = &mut resolving => {
                self.on_dns_operation_complete(&request, result, false);
                if blocking {
                    self.signal_worker(wait_id, true);
                }
            }
            _ = cancel_rx => {
                tracing::debug!(job = self.id, host = %request.host, "DNS request cancelled");
            }
        }
    }

    fn on_dns_operation_complete(
        self: &Arc<Self>,
        request: &PendingDnsRequest,
        result: Result<crate::dns::Addrs, NetError>,
        completed_synchronously: bool,
    ) {
        match &result {
            Err(e) if e.is_resolution_failure() => {
                tracing::debug!(job = self.id, host = %request.host, error = %e, "PAC DNS lookup failed");
            }
            Err(e) => {
                tracing::warn!(job = self.id, host = %request.host, error = %e, "PAC DNS resolver error");
            }
            Ok(_) => {}
        }

        // The answer must be cached before any restart is scheduled.
        self.lock_cache().store_result(&request.host, request.op, result);
        self.lock_state().in_flight = None;

        if self.is_cancelled() {
            return;
        }

        if !completed_synchronously {
            self.notify_load_state(LoadState::ResolvingProxyForUrl);
        }

        if self.is_blocking() || completed_synchronously {
            return;
        }

        let job = Arc::clone(self);
        if let Err(e) = self.params.worker.post_task(move || job.execute_non_blocking()) {
            tracing::warn!(job = self.id, error = %e, "could not schedule PAC restart");
        }
    }

    fn notify_load_state(&self, load_state: LoadState) {
        if let Some(callback) = &self.params.on_load_state_changed {
            callback(self.handle(), load_state);
        }
    }

    fn notify_caller(self: &Arc<Self>, result: Result<JobOutput, NetError>) {
        if self.is_cancelled() {
            return;
        }
        let job = Arc::clone(self);
        self.params.origin.spawn(async move {
            job.notify_caller_on_origin(result);
        });
    }

    fn notify_caller_on_origin(&self, result: Result<JobOutput, NetError>) {
        let callback = {
            let mut state = self.lock_state();
            if self.is_cancelled() {
                return;
            }
            state.callback.take()
        };

        let Some(callback) = self.release_callback(callback) else {
            return;
        };

        tracing::debug!(
            job = self.id,
            operation = self.operation.name(),
            attempts = self.attempts.load(Ordering::Relaxed),
            ok = result.is_ok(),
            "PAC job completed"
        );
        callback(result);
    }

    // -----------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------

    fn dispatch_alert_or_error(&self, entry: &AlertOrError) {
        // Racy with cancellation; a late entry in the net log is harmless.
        if self.is_cancelled() {
            return;
        }

        match entry.kind {
            AlertKind::Alert => {
                tracing::debug!(job = self.id, message = %entry.message, "PAC-alert");
                self.log_event(NetLogEventType::PacJavascriptAlert, alert_params(&entry.message));
            }
            AlertKind::Error => {
                match entry.line_number {
                    Some(line) => {
                        tracing::debug!(job = self.id, line, message = %entry.message, "PAC-error")
                    }
                    None => tracing::debug!(job = self.id, message = %entry.message, "PAC-error"),
                }
                self.log_event(
                    NetLogEventType::PacJavascriptError,
                    error_params(entry.line_number, &entry.message),
                );
                if let Some(observer) = &self.params.error_observer {
                    observer.on_pac_script_error(entry.line_number, &entry.message);
                }
            }
        }
    }

    fn log_event(&self, event_type: NetLogEventType, params: serde_json::Value) {
        self.bound_net_log.add_event(event_type, params.clone());
        if let Some(net_log) = &self.params.net_log {
            net_log.add_entry(NetLogEntry::new(event_type, NetLogSource::Global, params));
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("operation", &self.operation.name())
            .field("cancelled", &self.is_cancelled())
            .field("blocking_dns", &self.is_blocking())
            .finish_non_exhaustive()
    }
}

/// Frees the worker if a DNS task ends (or is dropped) without answering.
struct WaitGuard<'a> {
    job: &'a Job,
    wait_id: u64,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.job.abandon_wait(self.wait_id);
    }
}

/// State of one execution of the script. Created fresh per attempt.
struct Attempt<'a> {
    job: &'a Arc<Job>,
    blocking: bool,
    /// DNS hook calls made by this attempt.
    num_dns: usize,
    abandoned: bool,
    restart_with_blocking_dns: bool,
    alerts: AlertErrorBuffer,
}

impl<'a> Attempt<'a> {
    fn new(job: &'a Arc<Job>, blocking: bool) -> Self {
        Self {
            job,
            blocking,
            num_dns: 0,
            abandoned: false,
            restart_with_blocking_dns: false,
            alerts: AlertErrorBuffer::new(job.params.config.max_alerts_and_errors_bytes),
        }
    }

    fn answer(value: String) -> DnsHookOutcome {
        DnsHookOutcome::Continue((!value.is_empty()).then_some(value))
    }

    fn resolve_dns_blocking(&mut self, host: &str, op: ResolveDnsOperation) -> DnsHookOutcome {
        if let Some(value) = self.job.lookup_cached(host, op) {
            return Self::answer(value);
        }

        if self.job.cache_is_full() {
            // Keep running, but fail every further new lookup.
            tracing::debug!(job = self.job.id, host = %host, "unique DNS limit reached");
            return DnsHookOutcome::Continue(None);
        }

        if self.job.post_dns_operation_and_wait(host, op).is_none() {
            return DnsHookOutcome::Terminate;
        }

        match self.job.lookup_cached(host, op) {
            Some(value) => Self::answer(value),
            None => {
                tracing::warn!(job = self.job.id, host = %host, "DNS answer missing after wait");
                DnsHookOutcome::Continue(None)
            }
        }
    }

    fn resolve_dns_non_blocking(&mut self, host: &str, op: ResolveDnsOperation) -> DnsHookOutcome {
        if self.abandoned {
            // Only one dependency is traced per attempt.
            return DnsHookOutcome::Abandon;
        }

        self.num_dns += 1;

        if let Some(value) = self.job.lookup_cached(host, op) {
            return Self::answer(value);
        }

        if self.num_dns <= self.job.last_num_dns.load(Ordering::Relaxed) {
            // The lookups differ from the previous attempt's, so the script
            // is not deterministic enough to trace.
            tracing::debug!(
                job = self.job.id,
                num_dns = self.num_dns,
                "DNS call sequence diverged between attempts"
            );
            self.schedule_restart_with_blocking_dns();
            return DnsHookOutcome::Abandon;
        }

        if self.job.cache_is_full() {
            tracing::debug!(job = self.job.id, host = %host, "unique DNS limit reached");
            return DnsHookOutcome::Continue(None);
        }

        let Some(completed_synchronously) = self.job.post_dns_operation_and_wait(host, op) else {
            return DnsHookOutcome::Terminate;
        };

        if completed_synchronously {
            return match self.job.lookup_cached(host, op) {
                Some(value) => Self::answer(value),
                None => {
                    tracing::warn!(job = self.job.id, host = %host, "DNS answer missing after wait");
                    DnsHookOutcome::Continue(None)
                }
            };
        }

        // A DNS request is now outstanding; its completion restarts the
        // script.
        tracing::trace!(job = self.job.id, host = %host, num_dns = self.num_dns, "abandoning attempt");
        self.abandoned = true;
        self.job.last_num_dns.store(self.num_dns, Ordering::Relaxed);
        DnsHookOutcome::Abandon
    }

    fn schedule_restart_with_blocking_dns(&mut self) {
        debug_assert!(!self.blocking);
        debug_assert!(!self.abandoned);
        self.abandoned = true;
        self.restart_with_blocking_dns = true;
    }

    fn handle_alert_or_error(&mut self, entry: AlertOrError) {
        if self.job.is_cancelled() {
            return;
        }

        if self.blocking {
            self.job.dispatch_alert_or_error(&entry);
            return;
        }

        if self.abandoned {
            return;
        }

        if self.alerts.record(entry).is_err() {
            tracing::debug!(job = self.job.id, "alert buffer full");
            self.schedule_restart_with_blocking_dns();
        }
    }
}

impl JsBindings for Attempt<'_> {
    fn resolve_dns(&mut self, host: &str, op: ResolveDnsOperation) -> DnsHookOutcome {
        if self.job.is_cancelled() {
            return DnsHookOutcome::Terminate;
        }

        if !op.is_my_ip_address() && host.is_empty() {
            return DnsHookOutcome::Continue(None);
        }

        if self.blocking {
            self.resolve_dns_blocking(host, op)
        } else {
            self.resolve_dns_non_blocking(host, op)
        }
    }

    fn alert(&mut self, message: &str) {
        self.handle_alert_or_error(AlertOrError::alert(message));
    }

    fn on_error(&mut self, line_number: Option<u32>, message: &str) {
        self.handle_alert_or_error(AlertOrError::error(line_number, message));
    }
}
