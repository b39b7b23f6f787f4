use crate::base::neterror::NetError;
use crate::base::netlog::NetLog;
use crate::dns::Resolve;
use crate::proxy::config::TracingResolverConfig;
use crate::proxy::engine::{PacErrorObserver, PacScriptData, ProxyResolverEngineFactory};
use crate::proxy::job::{
    Job, JobOutput, JobParams, LoadStateChangedCallback, Operation, RequestHandle,
};
use crate::proxy::resolver::TracingProxyResolver;
use crate::proxy::worker::WorkerThread;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// Produces the error observer for each newly created resolver.
pub type PacErrorObserverFactory =
    Arc<dyn Fn() -> Option<Arc<dyn PacErrorObserver>> + Send + Sync>;

/// Creates [`TracingProxyResolver`]s from PAC scripts.
///
/// Each resolver gets its own worker thread. Script creation always runs
/// in blocking mode on that thread.
///
/// # Example
///
/// ```rust,ignore
/// use pacresolver::dns::GaiResolver;
/// use pacresolver::proxy::{PacScriptData, TracingProxyResolverFactory};
/// use std::sync::Arc;
///
/// let factory = TracingProxyResolverFactory::new(engine_factory, Arc::new(GaiResolver::new()));
/// let resolver = factory.create(PacScriptData::from_utf8(script)).await?;
/// let info = resolver.resolve(&"http://example.com/".parse()?).await?;
/// ```
pub struct TracingProxyResolverFactory {
    engine_factory: Arc<dyn ProxyResolverEngineFactory>,
    host_resolver: Arc<dyn Resolve>,
    error_observer_factory: Option<PacErrorObserverFactory>,
    net_log: Option<Arc<dyn NetLog>>,
    on_load_state_changed: Option<LoadStateChangedCallback>,
    config: TracingResolverConfig,
}

impl TracingProxyResolverFactory {
    pub fn new(
        engine_factory: Arc<dyn ProxyResolverEngineFactory>,
        host_resolver: Arc<dyn Resolve>,
    ) -> Self {
        Self {
            engine_factory,
            host_resolver,
            error_observer_factory: None,
            net_log: None,
            on_load_state_changed: None,
            config: TracingResolverConfig::default(),
        }
    }

    pub fn with_error_observer_factory(mut self, factory: PacErrorObserverFactory) -> Self {
        self.error_observer_factory = Some(factory);
        self
    }

    /// Global net log receiving every alert and script error.
    pub fn with_net_log(mut self, net_log: Arc<dyn NetLog>) -> Self {
        self.net_log = Some(net_log);
        self
    }

    pub fn with_load_state_callback(mut self, callback: LoadStateChangedCallback) -> Self {
        self.on_load_state_changed = Some(callback);
        self
    }

    pub fn with_config(mut self, config: TracingResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TracingResolverConfig {
        &self.config
    }

    /// Loads `script` on a fresh worker thread.
    ///
    /// Must be called from within a tokio runtime; `callback` runs there.
    /// Dropping the returned [`CreateRequest`] before `callback` runs
    /// cancels creation.
    pub fn create_proxy_resolver<F>(
        &self,
        script: PacScriptData,
        callback: F,
    ) -> Result<CreateRequest, NetError>
    where
        F: FnOnce(Result<TracingProxyResolver, NetError>) + Send + 'static,
    {
        if script.is_empty() {
            return Err(NetError::PacScriptFailed);
        }

        let origin = tokio::runtime::Handle::try_current().map_err(|e| {
            tracing::error!(error = %e, "PAC resolver created outside a tokio runtime");
            NetError::Unexpected
        })?;

        let worker = WorkerThread::start(&self.config.worker_thread_name)?;
        let error_observer = self.error_observer_factory.as_ref().and_then(|factory| factory());

        let params = Arc::new(JobParams::new(
            worker.handle(),
            origin,
            Arc::clone(&self.host_resolver),
            error_observer,
            self.net_log.clone(),
            self.on_load_state_changed.clone(),
            self.config.clone(),
        ));
        let worker = Arc::new(Mutex::new(Some(worker)));

        let job_params = Arc::clone(&params);
        let job_worker = Arc::clone(&worker);
        let operation =
            Operation::CreateEngine { script, factory: Arc::clone(&self.engine_factory) };

        let handle = Job::start(
            &params,
            operation,
            None,
            Box::new(move |result| {
                let worker = job_worker.lock().unwrap_or_else(PoisonError::into_inner).take();
                match (result, worker) {
                    (Ok(JobOutput::Engine(engine)), Some(worker)) => {
                        tracing::debug!(thread = worker.name(), "PAC resolver created");
                        callback(Ok(TracingProxyResolver::new(job_params, engine, worker)));
                    }
                    (Ok(_), _) => callback(Err(NetError::Unexpected)),
                    (Err(e), worker) => {
                        tracing::debug!(error = %e, "PAC script failed to load");
                        drop(worker);
                        callback(Err(e));
                    }
                }
            }),
        );

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                drop(worker.lock().unwrap_or_else(PoisonError::into_inner).take());
                return Err(e);
            }
        };

        Ok(CreateRequest { params, handle, worker })
    }

    /// Async form of [`create_proxy_resolver`](Self::create_proxy_resolver).
    pub async fn create(&self, script: PacScriptData) -> Result<TracingProxyResolver, NetError> {
        let (tx, rx) = oneshot::channel();
        let request = self.create_proxy_resolver(script, move |result| {
            let _ = tx.send(result);
        })?;

        let result = rx.await.map_err(|_| NetError::Aborted);
        drop(request);
        result?
    }
}

impl std::fmt::Debug for TracingProxyResolverFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingProxyResolverFactory")
            .field("config", &self.config)
            .field("has_net_log", &self.net_log.is_some())
            .finish_non_exhaustive()
    }
}

/// An in-progress resolver creation. Dropping it cancels the creation and
/// stops the worker thread.
pub struct CreateRequest {
    params: Arc<JobParams>,
    handle: RequestHandle,
    worker: Arc<Mutex<Option<WorkerThread>>>,
}

impl CreateRequest {
    pub fn is_pending(&self) -> bool {
        self.params.jobs.contains_key(&self.handle.id())
    }
}

impl Drop for CreateRequest {
    fn drop(&mut self) {
        self.params.cancel(self.handle);
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if worker.is_some() {
            tracing::debug!("PAC resolver creation cancelled");
        }
        drop(worker);
    }
}

impl std::fmt::Debug for CreateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateRequest")
            .field("handle", &self.handle)
            .field("pending", &self.is_pending())
            .finish()
    }
}
