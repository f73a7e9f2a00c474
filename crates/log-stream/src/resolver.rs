//! 주소 해석기 -- 주소 → 이름 조회와 소스별 캐시
//!
//! [`resolve`]는 캐시를 먼저 확인하고, 없으면 [`ReverseLookup`]으로 외부 조회를 수행합니다.
//! 조회 실패는 어떤 종류든 주소 자체를 이름으로 캐싱(네거티브 캐싱)하고 주소를 반환합니다.
//! 실패는 절대 호출자에게 전파되지 않습니다.
//!
//! 캐시는 만료되지 않습니다. 오래 실행되는 동안 주소 공간이 바뀌면
//! 오래된 네거티브 항목이 계속 남는다는 알려진 제약이 있습니다.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use dnstail_core::error::ResolveError;
use dnstail_core::metrics as m;
use dnstail_core::pipeline::ReverseLookup;
use hickory_resolver::TokioAsyncResolver;
use tracing::debug;

/// 주소 → 이름 캐시
///
/// 값이 주소와 같으면 "해석 실패"를 뜻하는 네거티브 항목입니다.
/// 키는 유일하고, 소스 스트림 수명 동안 단조 증가합니다.
#[derive(Debug, Default, Clone)]
pub struct ResolverCache {
    entries: HashMap<String, String>,
}

impl ResolverCache {
    /// 빈 캐시를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 캐시된 이름을 반환합니다.
    pub fn get(&self, address: &str) -> Option<&str> {
        self.entries.get(address).map(String::as_str)
    }

    /// 항목을 추가합니다.
    pub fn insert(&mut self, address: impl Into<String>, name: impl Into<String>) {
        self.entries.insert(address.into(), name.into());
    }

    /// 캐시된 항목 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 캐시가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 주소를 이름으로 해석합니다.
///
/// - 캐시 적중: 즉시 반환 (이전 해석 결과 또는 네거티브 항목)
/// - 캐시 미스: 외부 조회 후 결과를 캐싱. 실패 시 주소를 캐싱하고 주소를 반환
pub async fn resolve<L>(lookup: &L, address: &str, cache: &mut ResolverCache) -> String
where
    L: ReverseLookup + ?Sized,
{
    if let Some(name) = cache.get(address) {
        metrics::counter!(m::RESOLVER_CACHE_HITS_TOTAL).increment(1);
        return name.to_owned();
    }

    let name = match lookup.reverse_lookup(address).await {
        Ok(name) if !name.is_empty() => {
            metrics::counter!(m::RESOLVER_LOOKUPS_TOTAL, m::LABEL_RESULT => "success").increment(1);
            name
        }
        Ok(_) => {
            metrics::counter!(m::RESOLVER_LOOKUPS_TOTAL, m::LABEL_RESULT => "failure").increment(1);
            debug!(address, "reverse lookup returned an empty name, caching address");
            address.to_owned()
        }
        Err(e) => {
            metrics::counter!(m::RESOLVER_LOOKUPS_TOTAL, m::LABEL_RESULT => "failure").increment(1);
            debug!(address, error = %e, "reverse lookup failed, caching address");
            address.to_owned()
        }
    };

    cache.insert(address, name.clone());
    name
}

/// 표시용 호스트 레이블을 만듭니다.
///
/// 이름이 주소와 다르면 `name (address)`, 같으면(해석 실패) 주소만 반환합니다.
pub fn host_label(name: &str, address: &str) -> String {
    if name == address {
        address.to_owned()
    } else {
        format!("{name} ({address})")
    }
}

/// hickory 기반 PTR 역방향 조회
///
/// 시스템 리졸버 설정(`/etc/resolv.conf`)을 사용합니다.
#[derive(Clone)]
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl HickoryLookup {
    /// 시스템 설정으로 조회기를 생성합니다.
    pub fn from_system_conf(timeout: Duration) -> Result<Self, ResolveError> {
        let resolver =
            TokioAsyncResolver::tokio_from_system_conf().map_err(|e| ResolveError::Lookup {
                address: String::new(),
                reason: format!("failed to read system resolver config: {e}"),
            })?;
        Ok(Self { resolver, timeout })
    }
}

impl ReverseLookup for HickoryLookup {
    async fn reverse_lookup(&self, address: &str) -> Result<String, ResolveError> {
        let ip: IpAddr = address
            .parse()
            .map_err(|_| ResolveError::InvalidAddress(address.to_owned()))?;

        let lookup = tokio::time::timeout(self.timeout, self.resolver.reverse_lookup(ip))
            .await
            .map_err(|_| ResolveError::Timeout(address.to_owned()))?
            .map_err(|e| ResolveError::Lookup {
                address: address.to_owned(),
                reason: e.to_string(),
            })?;

        lookup
            .iter()
            .next()
            .map(|name| name.to_utf8().trim_end_matches('.').to_owned())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ResolveError::NotFound(address.to_owned()))
    }
}

/// 항상 실패하는 조회기
///
/// 역방향 조회가 비활성화되면 모든 주소가 그대로 표시됩니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLookup;

impl ReverseLookup for DisabledLookup {
    async fn reverse_lookup(&self, _address: &str) -> Result<String, ResolveError> {
        Err(ResolveError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 호출 횟수를 세는 조회기
    #[derive(Default)]
    struct CountingLookup {
        names: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl CountingLookup {
        fn with(address: &str, name: &str) -> Self {
            let mut names = HashMap::new();
            names.insert(address.to_owned(), name.to_owned());
            Self {
                names,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ReverseLookup for CountingLookup {
        async fn reverse_lookup(&self, address: &str) -> Result<String, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.names
                .get(address)
                .cloned()
                .ok_or_else(|| ResolveError::NotFound(address.to_owned()))
        }
    }

    #[tokio::test]
    async fn second_resolve_hits_cache() {
        let lookup = CountingLookup::with("192.168.1.100", "laptop.local");
        let mut cache = ResolverCache::new();

        let first = resolve(&lookup, "192.168.1.100", &mut cache).await;
        let second = resolve(&lookup, "192.168.1.100", &mut cache).await;

        assert_eq!(first, "laptop.local");
        assert_eq!(first, second);
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test]
    async fn failure_is_negatively_cached() {
        let lookup = CountingLookup::default();
        let mut cache = ResolverCache::new();

        let first = resolve(&lookup, "10.0.0.5", &mut cache).await;
        let second = resolve(&lookup, "10.0.0.5", &mut cache).await;

        assert_eq!(first, "10.0.0.5");
        assert_eq!(second, "10.0.0.5");
        assert_eq!(lookup.calls(), 1);
        assert_eq!(cache.get("10.0.0.5"), Some("10.0.0.5"));
    }

    #[tokio::test]
    async fn distinct_addresses_are_looked_up_separately() {
        let lookup = CountingLookup::with("10.0.0.1", "router.lan");
        let mut cache = ResolverCache::new();

        resolve(&lookup, "10.0.0.1", &mut cache).await;
        resolve(&lookup, "10.0.0.2", &mut cache).await;

        assert_eq!(lookup.calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn disabled_lookup_returns_address() {
        let mut cache = ResolverCache::new();
        let name = resolve(&DisabledLookup, "172.16.0.9", &mut cache).await;
        assert_eq!(name, "172.16.0.9");
    }

    #[test]
    fn host_label_formats() {
        assert_eq!(
            host_label("laptop.local", "192.168.1.100"),
            "laptop.local (192.168.1.100)"
        );
        assert_eq!(host_label("10.0.0.5", "10.0.0.5"), "10.0.0.5");
    }
}
