use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::bail;
use serde::{Serialize, Deserialize};

use crate::catalog::Catalog;
use crate::logging::debug;

pub const CONFIG_FILE_NAME: &str = "object-service.toml";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConfigFile {
    pub log_file: Option<PathBuf>,

    /// Cone-search radius, in degrees, used when a position has none
    #[serde(default = "default_radius")]
    pub default_radius: f64,

    /// How long resolved names stay cached
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// How long a healthy SIMBAD endpoint is trusted before it is checked again
    #[serde(default = "default_endpoint_ttl_secs")]
    pub endpoint_ttl_secs: u64,

    /// Catalogs object clauses are translated into, in output order
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    #[serde(default)]
    pub simbad: SimbadConfig,

    #[serde(default)]
    pub ned: NedConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SimbadConfig {
    #[serde(default = "default_simbad_url")]
    pub url: String,

    /// Mirror tried when the primary endpoint fails its health check
    #[serde(default = "default_simbad_backup_url")]
    pub backup_url: Option<String>,

    #[serde(default = "default_max_radius")]
    pub max_radius: f64,

    #[serde(default = "default_max_number")]
    pub max_number: usize,

    #[serde(default = "default_simbad_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NedConfig {
    /// ObjectLookup service for names
    #[serde(default = "default_ned_url")]
    pub url: String,

    /// Near-position search
    #[serde(default = "default_ned_objsearch_url")]
    pub objsearch_url: String,

    #[serde(default = "default_max_radius")]
    pub max_radius: f64,

    #[serde(default = "default_max_number")]
    pub max_number: usize,

    #[serde(default = "default_ned_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IndexConfig {
    #[serde(default = "default_index_url")]
    pub query_url: String,

    pub token: Option<String>,

    /// Check cone-search identifiers against the index before using them
    #[serde(default = "default_verify")]
    pub verify: bool,

    /// Most bibcodes returned by a reference search
    #[serde(default = "default_max_hits")]
    pub max_hits: usize,

    #[serde(default = "default_index_timeout_secs")]
    pub timeout_secs: u64,
}

pub fn default_radius() -> f64 {
    0.033333333 // 2 arcminutes
}

pub fn default_cache_ttl_secs() -> u64 {
    604800 // a week
}

pub fn default_endpoint_ttl_secs() -> u64 {
    300
}

pub fn default_targets() -> Vec<String> {
    Catalog::ALL.iter().map(|c| c.name().to_string()).collect()
}

pub fn default_simbad_url() -> String {
    "http://simbad.harvard.edu/simbad/sim-tap/sync".to_string()
}

pub fn default_simbad_backup_url() -> Option<String> {
    Some("http://simbad.u-strasbg.fr/simbad/sim-tap/sync".to_string())
}

pub fn default_max_radius() -> f64 {
    3.0
}

pub fn default_max_number() -> usize {
    50
}

pub fn default_simbad_timeout_secs() -> u64 {
    8
}

pub fn default_ned_url() -> String {
    "https://ned.ipac.caltech.edu/srs/ObjectLookup".to_string()
}

pub fn default_ned_objsearch_url() -> String {
    "https://ned.ipac.caltech.edu/cgi-bin/objsearch".to_string()
}

pub fn default_ned_timeout_secs() -> u64 {
    10
}

pub fn default_index_url() -> String {
    "https://api.adsabs.harvard.edu/v1/search/query".to_string()
}

pub fn default_verify() -> bool {
    true
}

pub fn default_max_hits() -> usize {
    10000
}

pub fn default_index_timeout_secs() -> u64 {
    10
}

impl Default for SimbadConfig {
    fn default() -> Self {
        SimbadConfig {
            url: default_simbad_url(),
            backup_url: default_simbad_backup_url(),
            max_radius: default_max_radius(),
            max_number: default_max_number(),
            timeout_secs: default_simbad_timeout_secs(),
        }
    }
}

impl Default for NedConfig {
    fn default() -> Self {
        NedConfig {
            url: default_ned_url(),
            objsearch_url: default_ned_objsearch_url(),
            max_radius: default_max_radius(),
            max_number: default_max_number(),
            timeout_secs: default_ned_timeout_secs(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            query_url: default_index_url(),
            token: None,
            verify: default_verify(),
            max_hits: default_max_hits(),
            timeout_secs: default_index_timeout_secs(),
        }
    }
}

/// Creates the default ConfigFile
impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            log_file: None,
            default_radius: default_radius(),
            cache_ttl_secs: default_cache_ttl_secs(),
            endpoint_ttl_secs: default_endpoint_ttl_secs(),
            targets: default_targets(),
            simbad: SimbadConfig::default(),
            ned: NedConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl SimbadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl NedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl IndexConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ConfigFile {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn endpoint_ttl(&self) -> Duration {
        Duration::from_secs(self.endpoint_ttl_secs)
    }

    /// The configured targets as catalogs, duplicates removed
    pub fn target_catalogs(&self) -> anyhow::Result<Vec<Catalog>> {
        let mut catalogs = Vec::new();

        for target in &self.targets {
            let catalog = Catalog::from_str(target)?;

            if !catalogs.contains(&catalog) {
                catalogs.push(catalog);
            }
        }

        Ok(catalogs)
    }

    pub fn sanity_check(&self) -> anyhow::Result<()> {
        debug!("{:?}", self);

        if !(self.default_radius > 0.0) {
            bail!("The default_radius must be greater than zero, found {}", self.default_radius);
        }

        if self.cache_ttl_secs == 0 {
            bail!("Cannot set cache_ttl_secs to zero");
        }

        // make sure every target is a catalog we can talk to
        if self.target_catalogs()?.is_empty() {
            bail!("At least one of \"simbad\" or \"ned\" must be listed in targets");
        }

        for (name, max_radius, max_number, timeout) in [
            ("simbad", self.simbad.max_radius, self.simbad.max_number, self.simbad.timeout_secs),
            ("ned", self.ned.max_radius, self.ned.max_number, self.ned.timeout_secs),
        ] {
            if !(max_radius > 0.0) {
                bail!("The {} max_radius must be greater than zero", name);
            }

            if max_number == 0 {
                bail!("Cannot set the {} max_number to zero", name);
            }

            if timeout == 0 {
                bail!("Cannot set the {} timeout_secs to zero", name);
            }
        }

        if self.index.verify && self.index.query_url.is_empty() {
            bail!("Index verification is on, but no index query_url is set");
        }

        if self.index.max_hits == 0 {
            bail!("Cannot set the index max_hits to zero");
        }

        Ok( () )
    }
}

#[cfg(test)]
mod config_file_tests {
    use crate::catalog::Catalog;
    use crate::config::ConfigFile;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ConfigFile = toml::from_str("").unwrap();

        assert_eq!(0.033333333, config.default_radius);
        assert_eq!(604800, config.cache_ttl_secs);
        assert_eq!(8, config.simbad.timeout_secs);
        assert_eq!(10, config.ned.timeout_secs);
        assert_eq!(50, config.ned.max_number);
        assert_eq!(10000, config.index.max_hits);
        assert_eq!(vec![Catalog::Simbad, Catalog::Ned], config.target_catalogs().unwrap());
        assert!(config.sanity_check().is_ok());
    }

    #[test]
    fn overrides() {
        let config: ConfigFile = toml::from_str(r#"
            default_radius = 0.1
            targets = ["ned"]

            [simbad]
            url = "http://localhost:1234/sim-tap/sync"
            max_number = 10

            [index]
            verify = false
            max_hits = 500
        "#).unwrap();

        assert_eq!(0.1, config.default_radius);
        assert_eq!(vec![Catalog::Ned], config.target_catalogs().unwrap());
        assert_eq!("http://localhost:1234/sim-tap/sync", config.simbad.url);
        assert_eq!(10, config.simbad.max_number);
        assert_eq!(3.0, config.simbad.max_radius);
        assert!(!config.index.verify);
        assert_eq!(500, config.index.max_hits);
        assert!(config.sanity_check().is_ok());
    }

    #[test]
    fn sanity_check_failures() {
        let config = ConfigFile { targets: vec!["vizier".to_string()], ..ConfigFile::default() };
        assert!(config.sanity_check().is_err());

        let config = ConfigFile { targets: vec![], ..ConfigFile::default() };
        assert!(config.sanity_check().is_err());

        let config = ConfigFile { default_radius: 0.0, ..ConfigFile::default() };
        assert!(config.sanity_check().is_err());

        let mut config = ConfigFile::default();
        config.ned.timeout_secs = 0;
        assert!(config.sanity_check().is_err());
    }
}
