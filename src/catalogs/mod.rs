mod simbad;
mod ned;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use maplit::btreemap;

use common::config::ConfigFile;
use common::Catalog;

use crate::error::CatalogError;
use crate::resolver::ResolverType;

pub use simbad::SimbadResolver;
pub use ned::NedResolver;

const USER_AGENT: &str = "ADS Object Service";

pub type Resolvers = BTreeMap<Catalog, Arc<ResolverType>>;

/// Builds the HTTP-backed resolver for every catalog
pub fn create_resolvers(config: &ConfigFile) -> anyhow::Result<Resolvers> {
    Ok(btreemap! {
        Catalog::Simbad => Arc::from(SimbadResolver::new(config)?),
        Catalog::Ned => Arc::from(NedResolver::new(config)?),
    })
}

fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Sorts a failed request into timeout, status, or transport errors
fn request_error(catalog: Catalog, timeout: Duration, err: reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        CatalogError::Timeout { catalog, timeout }
    } else if let Some(status) = err.status() {
        CatalogError::HttpStatus { catalog, status: status.as_u16() }
    } else if err.is_decode() {
        CatalogError::BadResponse { catalog, message: err.to_string() }
    } else {
        CatalogError::Transport { catalog, message: err.to_string() }
    }
}
