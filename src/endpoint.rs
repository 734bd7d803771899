use std::future::Future;
use std::time::Duration;

use common::logging::{debug, info, warn};
use common::TtlCache;

const CURRENT: &str = "current";

/// Picks the first healthy endpoint from a primary and its mirrors.
/// A healthy pick is remembered for `ttl`; failed health checks are never cached.
pub struct EndpointSelector {
    endpoints: Vec<String>,
    healthy: TtlCache<&'static str, String>,
}

impl EndpointSelector {
    pub fn new(primary: String, mirrors: Vec<String>, ttl: Duration) -> Self {
        let mut endpoints = vec![primary];
        endpoints.extend(mirrors);

        EndpointSelector { endpoints, healthy: TtlCache::new(ttl) }
    }

    pub fn primary(&self) -> &str {
        self.endpoints[0].as_str()
    }

    /// Returns the remembered endpoint, or health checks each endpoint in order.
    /// When every check fails the primary is returned, so the real request reports the failure.
    pub async fn select<F, Fut>(&self, is_healthy: F) -> String
        where F: Fn(String) -> Fut, Fut: Future<Output = bool>
    {
        if let Some(url) = self.healthy.get(CURRENT) {
            return url;
        }

        for url in &self.endpoints {
            if is_healthy(url.clone()).await {
                info!("Using endpoint {}", url);
                self.healthy.insert(CURRENT, url.clone());
                return url.clone();
            }

            warn!("Endpoint {} failed its health check", url);
        }

        debug!("No healthy endpoint found, falling back to {}", self.primary());

        self.primary().to_string()
    }
}
