use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};

use common::config::{ConfigFile, NedConfig};
use common::logging::{debug, info};
use common::{Catalog, Coordinate};

use crate::catalogs::{http_client, request_error};
use crate::error::CatalogError;
use crate::resolver::{CatalogResolver, NameLookups, ObjectRecord, Records, ResolverType};

const STATUS_OK: i64 = 100;
const RESULT_AMBIGUOUS: i64 = 1;
const RESULT_KNOWN_OBJECT: i64 = 3;

/// What ObjectLookup made of one name
#[derive(Debug, Clone, PartialEq)]
enum Lookup {
    Known(ObjectRecord),
    /// Several candidates, with NED's aliases for them
    Ambiguous(Vec<String>),
    Unknown,
}

/// Fixed parameters of a NED near-position search
const OBJSEARCH_PARAMS: [(&str, &str); 20] = [
    ("of", "ascii_bar"),
    ("search_type", "Near Position Search"),
    ("img_stamp", "NO"),
    ("list_limit", "5"),
    ("zv_breaker", "30000.0"),
    ("obj_sort", "Distance to search center"),
    ("out_equinox", "J2000.0"),
    ("out_csys", "Equatorial"),
    ("nmp_op", "ANY"),
    ("ot_include", "ANY"),
    ("z_unit", "z"),
    ("z_value1", ""),
    ("z_value2", ""),
    ("z_constraint", "Unconstrained"),
    ("corr_z", "1"),
    ("omegav", "0.73"),
    ("omegam", "0.27"),
    ("hconst", "73"),
    ("in_equinox", "J2000.0"),
    ("in_csys", "Equatorial"),
];

/// NED: ObjectLookup for names, objsearch for positions
pub struct NedResolver {
    client: reqwest::Client,
    config: NedConfig,
}

impl NedResolver {
    pub fn new(config: &ConfigFile) -> anyhow::Result<Box<ResolverType>> {
        let client = http_client(config.ned.timeout())
            .context("Building the NED HTTP client")?;

        Ok(Box::new(NedResolver { client, config: config.ned.clone() }))
    }

    async fn lookup(&self, name: &str) -> Result<Lookup, CatalogError> {
        let response = self.client.post(self.config.url.as_str())
            .json(&json!({ "name": { "v": name } }))
            .send()
            .await
            .map_err(|e| request_error(Catalog::Ned, self.config.timeout(), e))?;

        if !response.status().is_success() {
            info!("NED request to {} failed with status {}", self.config.url, response.status());
            return Err(CatalogError::HttpStatus { catalog: Catalog::Ned, status: response.status().as_u16() });
        }

        let payload = response.json::<Value>()
            .await
            .map_err(|e| bad_response(format!("response is not JSON: {}", e)))?;

        decode_lookup(name, &payload)
    }
}

#[async_trait]
impl CatalogResolver for NedResolver {
    fn catalog(&self) -> Catalog {
        Catalog::Ned
    }

    fn max_radius(&self) -> f64 {
        self.config.max_radius
    }

    fn max_results(&self) -> usize {
        self.config.max_number
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn resolve_names(&self, names: &[String]) -> Result<Records, CatalogError> {
        Ok(self.lookup_names(names).await?.records)
    }

    /// One lookup per name, run concurrently; any failed lookup fails the call
    async fn lookup_names(&self, names: &[String]) -> Result<NameLookups, CatalogError> {
        let lookups = names.iter().map(|name| async move {
            // identifiers carry underscores in place of spaces
            let lookup_name = name.trim().replace('_', " ");
            (name.clone(), self.lookup(lookup_name.as_str()).await)
        });

        let mut found = NameLookups::default();

        for (name, res) in join_all(lookups).await {
            match res? {
                Lookup::Known(record) => { found.records.insert(name, record); }
                Lookup::Ambiguous(aliases) => found.ambiguous.push((name, aliases)),
                Lookup::Unknown => (),
            }
        }

        Ok(found)
    }

    /// NED identifiers are names, so no request is needed
    async fn resolve_identifiers(&self, identifiers: &[String]) -> Result<Records, CatalogError> {
        Ok(identifiers.iter()
            .map(|id| (id.clone(), ObjectRecord { id: id.clone(), canonical: id.trim().replace('_', " ") }))
            .collect())
    }

    async fn resolve_by_position(&self, coordinate: &Coordinate, radius: f64, max_results: usize) -> Result<Vec<String>, CatalogError> {
        let (lon, lat) = coordinate.to_hmsdms();
        // objsearch takes the radius in arcminutes
        let radius = format!("{}", radius * 60.0);

        let mut params = OBJSEARCH_PARAMS.iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect::<Vec<_>>();

        params.push(("lon", lon));
        params.push(("lat", lat));
        params.push(("radius", radius));

        info!("NED cone search at {} with {:?}", self.config.objsearch_url, params);

        let response = self.client.get(self.config.objsearch_url.as_str())
            .query(&params)
            .header(reqwest::header::ACCEPT, "text/plain")
            .send()
            .await
            .map_err(|e| request_error(Catalog::Ned, self.config.timeout(), e))?;

        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus { catalog: Catalog::Ned, status: response.status().as_u16() });
        }

        let body = response.text()
            .await
            .map_err(|e| request_error(Catalog::Ned, self.config.timeout(), e))?;

        Ok(decode_objsearch(body.as_str(), max_results))
    }
}

fn bad_response(message: String) -> CatalogError {
    CatalogError::BadResponse { catalog: Catalog::Ned, message }
}

fn decode_lookup(name: &str, payload: &Value) -> Result<Lookup, CatalogError> {
    let status = payload.get("StatusCode").and_then(|v| v.as_i64()).unwrap_or(999);

    if status != STATUS_OK {
        info!("NED returned status code {} for object {}", status, name);
        return Ok(Lookup::Unknown);
    }

    match payload.get("ResultCode").and_then(|v| v.as_i64()).unwrap_or(999) {
        RESULT_KNOWN_OBJECT => {
            let preferred = payload.pointer("/Preferred/Name")
                .and_then(|v| v.as_str())
                .map(|s| s.trim())
                .ok_or_else(|| bad_response(format!("no preferred name for {}", name)))?;

            Ok(Lookup::Known(ObjectRecord { id: preferred.replace(' ', "_"), canonical: preferred.to_string() }))
        }
        RESULT_AMBIGUOUS => {
            let aliases = payload.pointer("/Interpreted/Aliases")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str()).map(|s| s.to_string()).collect())
                .unwrap_or_default();

            debug!("NED found {} as ambiguous: {:?}", name, aliases);
            Ok(Lookup::Ambiguous(aliases))
        }
        code @ (0 | 2) => {
            debug!("NED returned result code {} for object {}", code, name);
            Ok(Lookup::Unknown)
        }
        code => {
            info!("Unexpected result code {} from NED for object {}", code, name);
            Ok(Lookup::Unknown)
        }
    }
}

/// Object names from column 1 of the `|`-separated listing, header dropped
fn decode_objsearch(body: &str, max_results: usize) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.split('|').nth(1))
        .map(|name| name.trim().replace(' ', "_"))
        .filter(|name| !name.is_empty() && name != "Object_Name")
        .take(max_results)
        .collect()
}

#[cfg(test)]
mod ned_tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::net::TcpListener;

    use common::config::ConfigFile;
    use common::logging::init_test_logger;
    use common::{Catalog, Coordinate};

    use crate::catalogs::ned::{decode_lookup, decode_objsearch, Lookup, NedResolver};
    use crate::error::CatalogError;

    #[test]
    fn lookup_results() {
        let hit = json!({ "StatusCode": 100, "ResultCode": 3, "Preferred": { "Name": "MESSIER 031 " } });
        let record = match decode_lookup("M31", &hit).unwrap() {
            Lookup::Known(record) => record,
            other => panic!("expected a known object, got {:?}", other),
        };

        assert_eq!("MESSIER_031", record.id);
        assert_eq!("MESSIER 031", record.canonical);

        for code in [0, 2, 7] {
            let miss = json!({ "StatusCode": 100, "ResultCode": code });
            assert_eq!(Lookup::Unknown, decode_lookup("x", &miss).unwrap());
        }

        let ambiguous = json!({ "StatusCode": 100, "ResultCode": 1, "Interpreted": { "Aliases": ["a", "b", "c"] } });
        assert_eq!(Lookup::Ambiguous(vec!["a".to_string(), "b".to_string(), "c".to_string()]), decode_lookup("NGC 224", &ambiguous).unwrap());

        assert_eq!(Lookup::Unknown, decode_lookup("x", &json!({ "StatusCode": 300 })).unwrap());
        assert!(matches!(decode_lookup("x", &json!({ "StatusCode": 100, "ResultCode": 3 })), Err(CatalogError::BadResponse { .. })));
    }

    #[test]
    fn objsearch_listing() {
        let body = "NED results\n\
                    No.|Object Name|RA|DEC|Type\n\
                    1|MESSIER 031|00h42m44.3s|+41d16m09s|G\n\
                    2|NGC 0224|00h42m44.3s|+41d16m09s|G\n\
                    3|2MASX J00424433+4116074|00h42m44.3s|+41d16m07s|G\n";

        assert_eq!(vec!["MESSIER_031", "NGC_0224", "2MASX_J00424433+4116074"], decode_objsearch(body, 50));
        assert_eq!(vec!["MESSIER_031"], decode_objsearch(body, 1));
        assert!(decode_objsearch("nothing here", 50).is_empty());
    }

    #[tokio::test]
    async fn identifiers_need_no_request() {
        let resolver = NedResolver::new(&ConfigFile::default()).unwrap();
        let records = resolver.resolve_identifiers(&["MESSIER_031".to_string()]).await.unwrap();

        assert_eq!("MESSIER 031", records["MESSIER_031"].canonical);
        assert_eq!("MESSIER_031", records["MESSIER_031"].id);
    }

    #[tokio::test]
    async fn unresponsive_server_times_out() {
        init_test_logger();

        // accepts connections but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = ConfigFile::default();
        config.ned.url = format!("http://{}/srs/ObjectLookup", addr);
        config.ned.objsearch_url = format!("http://{}/cgi-bin/objsearch", addr);
        config.ned.timeout_secs = 1;

        let resolver = NedResolver::new(&config).unwrap();
        let res = tokio::time::timeout(Duration::from_secs(10), resolver.resolve_names(&["M31".to_string()]))
            .await
            .expect("the client timeout should fire first");

        assert_eq!(Err(CatalogError::Timeout { catalog: Catalog::Ned, timeout: Duration::from_secs(1) }), res);

        let res = resolver.resolve_by_position(&Coordinate { ra: 10.0, dec: 41.0 }, 0.1, 5).await;
        assert!(matches!(res, Err(CatalogError::Timeout { .. })));

        server.abort();
    }
}
