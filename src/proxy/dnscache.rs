//! Per-job DNS answers accumulated across attempts.
//!
//! Every restart of a PAC script replays the lookups made by earlier
//! attempts; answering them from this cache is what lets a restarted
//! attempt get further than the one before it.

use crate::base::neterror::NetError;
use crate::base::priority::RequestPriority;
use crate::dns::{AddressFamily, Addrs, ResolveRequest};
use crate::proxy::engine::ResolveDnsOperation;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Host recorded in cache keys for `myIpAddress()` style operations.
///
/// The script-supplied argument is irrelevant for those calls, so they all
/// share one entry per operation.
pub const MY_IP_ADDRESS_HOST: &str = "<my-ip-address>";

/// Port attached to every PAC DNS request.
const PAC_DNS_PORT: u16 = 80;

/// Cache key: operation kind plus hostname.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DnsCacheKey {
    op: ResolveDnsOperation,
    host: String,
}

impl DnsCacheKey {
    /// Derives the key for `(host, op)`.
    ///
    /// `MyIpAddress`/`MyIpAddressEx` ignore `host` and use
    /// [`MY_IP_ADDRESS_HOST`], so repeated calls collide on one entry.
    pub fn new(host: &str, op: ResolveDnsOperation) -> Self {
        let host = if op.is_my_ip_address() { MY_IP_ADDRESS_HOST } else { host };
        Self { op, host: host.to_string() }
    }

    pub fn op(&self) -> ResolveDnsOperation {
        self.op
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Append-only map of DNS answers for one job.
///
/// Values are serialized address strings; an empty value records a
/// failed resolution.
#[derive(Debug, Default, Clone)]
pub struct LocalDnsCache {
    entries: HashMap<DnsCacheKey, String>,
}

impl LocalDnsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored value for `(host, op)`, or `None` on a miss.
    pub fn lookup(&self, host: &str, op: ResolveDnsOperation) -> Option<&str> {
        self.entries.get(&DnsCacheKey::new(host, op)).map(String::as_str)
    }

    /// Stores `value` unless the key already has one.
    ///
    /// Returns `false` when an earlier value was kept.
    pub fn store(&mut self, host: &str, op: ResolveDnsOperation, value: String) -> bool {
        let key = DnsCacheKey::new(host, op);
        if let Some(existing) = self.entries.get(&key) {
            if *existing != value {
                tracing::trace!(host = %host, op = %op, "ignoring conflicting DNS answer");
            }
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    /// Serializes a resolver answer and stores it.
    pub fn store_result(
        &mut self,
        host: &str,
        op: ResolveDnsOperation,
        result: Result<Addrs, NetError>,
    ) -> bool {
        let value = serialize_addresses(op, result);
        self.store(host, op, value)
    }

    /// Number of distinct lookups cached.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Converts a resolver answer into the string handed back to the script.
///
/// Failures become `""`. The plain operations return the first address;
/// the `Ex` operations return every address joined with `;`. Ports are
/// never included.
pub fn serialize_addresses(op: ResolveDnsOperation, result: Result<Addrs, NetError>) -> String {
    let mut addrs = match result {
        Ok(addrs) => addrs,
        Err(_) => return String::new(),
    };

    if op.is_ex() {
        addrs.map(|a| a.ip().to_string()).collect::<Vec<_>>().join(";")
    } else {
        addrs.next().map(|a| a.ip().to_string()).unwrap_or_default()
    }
}

/// Builds the resolver request servicing a PAC DNS operation.
///
/// `myIpAddress` operations resolve this machine's host name and are
/// flagged as such; the non-`Ex` forms are limited to IPv4.
pub fn make_request(
    host: &str,
    op: ResolveDnsOperation,
    priority: RequestPriority,
) -> ResolveRequest {
    let name = if op.is_my_ip_address() { local_host_name() } else { host };
    let mut request = ResolveRequest::new(name).with_port(PAC_DNS_PORT).with_priority(priority);
    if op.is_my_ip_address() {
        request = request.my_ip_address();
    }
    if !op.is_ex() {
        request = request.with_family(AddressFamily::Ipv4);
    }
    request
}

/// This machine's host name, falling back to `localhost`.
pub fn local_host_name() -> &'static str {
    static HOST_NAME: LazyLock<String> = LazyLock::new(|| {
        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    });
    &HOST_NAME
}
