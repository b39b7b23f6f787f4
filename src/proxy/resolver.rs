use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::base::netlog::NetLog;
use crate::proxy::engine::ProxyResolverEngine;
use crate::proxy::info::ProxyInfo;
use crate::proxy::job::{Job, JobOutput, JobParams, Operation, RequestHandle};
use crate::proxy::worker::WorkerThread;
use std::sync::Arc;
use tokio::sync::oneshot;
use url::Url;

/// Runs `FindProxyForURL()` on a dedicated worker thread, tracing the
/// script's DNS dependencies instead of blocking the thread on them.
///
/// Created by [`TracingProxyResolverFactory`](super::TracingProxyResolverFactory).
/// Dropping the resolver cancels every outstanding request and joins the
/// worker thread.
pub struct TracingProxyResolver {
    params: Arc<JobParams>,
    engine: Arc<dyn ProxyResolverEngine>,
    worker: Option<WorkerThread>,
}

impl TracingProxyResolver {
    pub(crate) fn new(
        params: Arc<JobParams>,
        engine: Arc<dyn ProxyResolverEngine>,
        worker: WorkerThread,
    ) -> Self {
        Self { params, engine, worker: Some(worker) }
    }

    /// Starts resolving the proxy list for `url`.
    ///
    /// `callback` runs on the runtime this method was called from, exactly
    /// once, unless the request is cancelled first.
    pub fn get_proxy_for_url<F>(
        &self,
        url: &Url,
        net_log: Option<Arc<dyn NetLog>>,
        callback: F,
    ) -> Result<RequestHandle, NetError>
    where
        F: FnOnce(Result<ProxyInfo, NetError>) + Send + 'static,
    {
        let operation =
            Operation::GetProxyForUrl { url: url.clone(), engine: Arc::clone(&self.engine) };

        Job::start(
            &self.params,
            operation,
            net_log,
            Box::new(move |result| {
                callback(result.and_then(|output| match output {
                    JobOutput::Proxy(info) => Ok(info),
                    JobOutput::Engine(_) => Err(NetError::Unexpected),
                }))
            }),
        )
    }

    /// Resolves the proxy list for `url`.
    ///
    /// Dropping the returned future cancels the request.
    pub async fn resolve(&self, url: &Url) -> Result<ProxyInfo, NetError> {
        let (tx, rx) = oneshot::channel();
        let handle = self.get_proxy_for_url(url, None, move |result| {
            let _ = tx.send(result);
        })?;

        let mut guard = CancelOnDrop { resolver: self, handle: Some(handle) };
        let result = rx.await.map_err(|_| NetError::Aborted);
        guard.handle = None;
        result?
    }

    /// Cancels a pending request. Unknown or finished handles are ignored.
    pub fn cancel_request(&self, handle: RequestHandle) {
        self.params.cancel(handle);
    }

    /// `None` once the request has finished or been cancelled.
    pub fn get_load_state(&self, handle: RequestHandle) -> Option<LoadState> {
        self.params.load_state(handle)
    }

    /// Requests whose callback has neither run nor been released.
    pub fn outstanding_requests(&self) -> usize {
        self.params.outstanding_callbacks()
    }

    pub fn worker_thread_name(&self) -> Option<&str> {
        self.worker.as_ref().map(WorkerThread::name)
    }
}

impl Drop for TracingProxyResolver {
    fn drop(&mut self) {
        let outstanding = self.params.outstanding_callbacks();
        if outstanding > 0 {
            tracing::debug!(outstanding, "dropping resolver with requests in flight");
        }
        // Cancelling first releases a worker blocked on DNS.
        self.params.cancel_all();
        drop(self.worker.take());
    }
}

impl std::fmt::Debug for TracingProxyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingProxyResolver")
            .field("worker", &self.worker)
            .field("outstanding", &self.params.outstanding_callbacks())
            .finish()
    }
}

struct CancelOnDrop<'a> {
    resolver: &'a TracingProxyResolver,
    handle: Option<RequestHandle>,
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.resolver.cancel_request(handle);
        }
    }
}
