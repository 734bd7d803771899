use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::{Catalog, Coordinate};

use crate::error::CatalogError;

pub type ResolverType = dyn CatalogResolver + Send + Sync;

/// What a catalog knows about one object
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Catalog identifier: the SIMBAD oid, or the NED name with underscores
    pub id: String,
    /// The catalog's preferred name for the object
    pub canonical: String,
}

/// Lookup key -> record; keys without a match are absent
pub type Records = HashMap<String, ObjectRecord>;

/// Name lookups, plus the names the catalog could not pin down to one object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameLookups {
    pub records: Records,
    /// (input name, candidate aliases), in input order
    pub ambiguous: Vec<(String, Vec<String>)>,
}

/// A remote name catalog.
/// Implementations enforce their own request timeout; callers may also bound the call with [bounded].
#[async_trait]
pub trait CatalogResolver {
    fn catalog(&self) -> Catalog;

    /// Largest cone-search radius, in degrees, the catalog is asked for
    fn max_radius(&self) -> f64;

    /// Largest number of identifiers returned by a cone search
    fn max_results(&self) -> usize;

    fn timeout(&self) -> Duration;

    /// Records keyed by the input name; unknown names are left out
    async fn resolve_names(&self, names: &[String]) -> Result<Records, CatalogError>;

    /// Like [CatalogResolver::resolve_names], also reporting ambiguous names.
    /// Catalogs without a notion of ambiguity report none.
    async fn lookup_names(&self, names: &[String]) -> Result<NameLookups, CatalogError> {
        Ok(NameLookups { records: self.resolve_names(names).await?, ambiguous: Vec::new() })
    }

    /// Records keyed by the input identifier; unknown identifiers are left out
    async fn resolve_identifiers(&self, identifiers: &[String]) -> Result<Records, CatalogError>;

    /// Identifiers of the objects within `radius` degrees, nearest first
    async fn resolve_by_position(&self, coordinate: &Coordinate, radius: f64, max_results: usize) -> Result<Vec<String>, CatalogError>;
}

/// Runs a catalog call, turning an overrun of `timeout` into [CatalogError::Timeout]
pub async fn bounded<T, F>(catalog: Catalog, timeout: Duration, call: F) -> Result<T, CatalogError>
    where F: Future<Output = Result<T, CatalogError>>
{
    match tokio::time::timeout(timeout, call).await {
        Ok(res) => res,
        Err(_) => Err(CatalogError::Timeout { catalog, timeout }),
    }
}

#[cfg(test)]
pub mod test_resolvers {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use common::{Catalog, Coordinate};

    use crate::error::CatalogError;
    use crate::resolver::{CatalogResolver, NameLookups, ObjectRecord, Records};

    /// In-memory catalog used by the tests
    pub struct StaticResolver {
        pub catalog: Catalog,
        pub names: HashMap<String, ObjectRecord>,
        pub cone: Result<Vec<String>, CatalogError>,
        pub delay: Option<Duration>,
        pub name_calls: AtomicUsize,
        pub cone_radius: Mutex<Option<f64>>,
        pub fail_names: Option<CatalogError>,
        pub ambiguous: HashMap<String, Vec<String>>,
    }

    impl StaticResolver {
        pub fn new(catalog: Catalog, names: &[(&str, &str, &str)]) -> Self {
            StaticResolver {
                catalog,
                names: names.iter()
                    .map(|(name, id, canonical)| (name.to_string(), ObjectRecord { id: id.to_string(), canonical: canonical.to_string() }))
                    .collect(),
                cone: Ok(Vec::new()),
                delay: None,
                name_calls: AtomicUsize::new(0),
                cone_radius: Mutex::new(None),
                fail_names: None,
                ambiguous: HashMap::new(),
            }
        }

        pub fn with_cone(mut self, cone: Result<Vec<&str>, CatalogError>) -> Self {
            self.cone = cone.map(|ids| ids.into_iter().map(|id| id.to_string()).collect());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn failing_names(mut self, err: CatalogError) -> Self {
            self.fail_names = Some(err);
            self
        }

        pub fn with_ambiguous(mut self, name: &str, aliases: &[&str]) -> Self {
            self.ambiguous.insert(name.to_string(), aliases.iter().map(|a| a.to_string()).collect());
            self
        }

        pub fn name_calls(&self) -> usize {
            self.name_calls.load(Ordering::SeqCst)
        }

        async fn pause(&self) {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl CatalogResolver for StaticResolver {
        fn catalog(&self) -> Catalog {
            self.catalog
        }

        fn max_radius(&self) -> f64 {
            1.0
        }

        fn max_results(&self) -> usize {
            5
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(200)
        }

        async fn resolve_names(&self, names: &[String]) -> Result<Records, CatalogError> {
            self.name_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;

            if let Some(err) = &self.fail_names {
                return Err(err.clone());
            }

            Ok(names.iter()
                .filter_map(|n| self.names.iter().find(|(k, _)| k.eq_ignore_ascii_case(n)).map(|(_, r)| (n.clone(), r.clone())))
                .collect())
        }

        async fn lookup_names(&self, names: &[String]) -> Result<NameLookups, CatalogError> {
            let records = self.resolve_names(names).await?;
            let ambiguous = names.iter()
                .filter_map(|n| self.ambiguous.get(n).map(|aliases| (n.clone(), aliases.clone())))
                .collect();

            Ok(NameLookups { records, ambiguous })
        }

        async fn resolve_identifiers(&self, identifiers: &[String]) -> Result<Records, CatalogError> {
            Ok(identifiers.iter()
                .filter_map(|id| self.names.values().find(|r| &r.id == id).map(|r| (id.clone(), r.clone())))
                .collect())
        }

        async fn resolve_by_position(&self, _coordinate: &Coordinate, radius: f64, max_results: usize) -> Result<Vec<String>, CatalogError> {
            *self.cone_radius.lock().unwrap() = Some(radius);
            self.pause().await;

            self.cone.clone().map(|mut ids| {
                ids.truncate(max_results);
                ids
            })
        }
    }
}
