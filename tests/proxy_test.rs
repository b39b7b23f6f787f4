//! Proxy Result Tests
//!
//! Covers:
//! - `ProxyInfo` PAC string parsing and serialization
//! - `ProxyServer` schemes and default ports
//! - `LocalDnsCache` value formatting

use pacresolver::base::neterror::NetError;
use pacresolver::dns::Addrs;
use pacresolver::proxy::dnscache::{serialize_addresses, LocalDnsCache};
use pacresolver::proxy::{ProxyInfo, ProxyScheme, ProxyServer, ResolveDnsOperation};

use std::net::SocketAddr;

#[test]
fn test_proxy_list_fallback_order() {
    let info = ProxyInfo::from_pac_string("PROXY a.example:8080; SOCKS5 b.example; DIRECT");

    let list = info.proxy_list();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0].scheme(), ProxyScheme::Http);
    assert_eq!(list[1].scheme(), ProxyScheme::Socks5);
    assert_eq!(list[1].host_port(), Some(("b.example", 1080)));
    assert!(list[2].is_direct());
}

#[test]
fn test_use_pac_string_replaces_list() {
    let mut info = ProxyInfo::direct();
    info.use_pac_string("HTTPS secure.example:443");
    assert_eq!(info.proxy_server(), &ProxyServer::new(ProxyScheme::Https, "secure.example", 443));

    info.use_direct();
    assert!(info.is_direct());
}

#[test]
fn test_cache_values_for_script() {
    let addrs: Vec<SocketAddr> = vec!["10.0.0.1:80".parse().unwrap(), "[fe80::1]:80".parse().unwrap()];
    let result = || Ok(Box::new(addrs.clone().into_iter()) as Addrs);

    assert_eq!(serialize_addresses(ResolveDnsOperation::DnsResolve, result()), "10.0.0.1");
    assert_eq!(
        serialize_addresses(ResolveDnsOperation::MyIpAddressEx, result()),
        "10.0.0.1;fe80::1"
    );

    let mut cache = LocalDnsCache::new();
    cache.store_result("gone.test", ResolveDnsOperation::DnsResolveEx, Err(NetError::DnsTimedOut));
    assert_eq!(cache.lookup("gone.test", ResolveDnsOperation::DnsResolveEx), Some(""));
    assert_eq!(cache.len(), 1);
}
