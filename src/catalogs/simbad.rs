use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use common::config::{ConfigFile, SimbadConfig};
use common::logging::{debug, info, warn};
use common::{Catalog, Coordinate};

use crate::catalogs::{http_client, request_error};
use crate::endpoint::EndpointSelector;
use crate::error::CatalogError;
use crate::resolver::{CatalogResolver, ObjectRecord, Records, ResolverType};

lazy_static! {
    static ref CATALOG_PREFIX: Regex = Regex::new(r"^(NAME|\*|S?V\*)\s+").unwrap();
}

const PROBE_QUERY: &str = "SELECT TOP 1 oid FROM basic";

/// SIMBAD, queried through its TAP (ADQL) service
pub struct SimbadResolver {
    client: reqwest::Client,
    endpoints: EndpointSelector,
    config: SimbadConfig,
}

impl SimbadResolver {
    pub fn new(config: &ConfigFile) -> anyhow::Result<Box<ResolverType>> {
        let simbad = config.simbad.clone();
        let client = http_client(simbad.timeout())
            .context("Building the SIMBAD HTTP client")?;
        let endpoints = EndpointSelector::new(
            simbad.url.clone(),
            simbad.backup_url.iter().cloned().collect(),
            config.endpoint_ttl(),
        );

        Ok(Box::new(SimbadResolver { client, endpoints, config: simbad }))
    }

    async fn endpoint(&self) -> String {
        self.endpoints.select(|url| self.health_check(url)).await
    }

    async fn health_check(&self, url: String) -> bool {
        match self.tap_query(url.as_str(), PROBE_QUERY.to_string(), Some(1)).await {
            Ok(_) => true,
            Err(e) => {
                debug!("SIMBAD health check of {} failed: {}", url, e);
                false
            }
        }
    }

    async fn tap_query(&self, url: &str, adql: String, maxrec: Option<usize>) -> Result<Value, CatalogError> {
        let mut params = vec![
            ("request", "doQuery".to_string()),
            ("lang", "adql".to_string()),
            ("format", "json".to_string()),
            ("query", adql),
        ];

        if let Some(maxrec) = maxrec {
            params.push(("maxrec", maxrec.to_string()));
        }

        let response = self.client.post(url)
            .form(&params)
            .send()
            .await
            .map_err(|e| request_error(Catalog::Simbad, self.config.timeout(), e))?;

        if !response.status().is_success() {
            info!("SIMBAD request to {} failed with status {}", url, response.status());
            return Err(CatalogError::HttpStatus { catalog: Catalog::Simbad, status: response.status().as_u16() });
        }

        response.json::<Value>()
            .await
            .map_err(|e| bad_response(format!("response is not JSON: {}", e)))
    }
}

#[async_trait]
impl CatalogResolver for SimbadResolver {
    fn catalog(&self) -> Catalog {
        Catalog::Simbad
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
        if names.is_empty() {
            return Ok(Records::new());
        }

        let url = self.endpoint().await;
        info!("Resolving {} name(s) with SIMBAD at {}", names.len(), url);

        let payload = self.tap_query(url.as_str(), names_query(names), None).await?;

        Ok(select_names(names, &decode_name_rows(&payload)?))
    }

    async fn resolve_identifiers(&self, identifiers: &[String]) -> Result<Records, CatalogError> {
        if identifiers.is_empty() {
            return Ok(Records::new());
        }

        let url = self.endpoint().await;
        let payload = self.tap_query(url.as_str(), identifiers_query(identifiers), None).await?;

        decode_identifier_rows(&payload)
    }

    async fn resolve_by_position(&self, coordinate: &Coordinate, radius: f64, max_results: usize) -> Result<Vec<String>, CatalogError> {
        let url = self.endpoint().await;
        info!("SIMBAD cone search at {} around ({}, {}) radius {}", url, coordinate.ra, coordinate.dec, radius);

        let payload = self.tap_query(url.as_str(), position_query(coordinate, radius, max_results), Some(max_results)).await?;

        decode_position_rows(&payload)
    }
}

fn bad_response(message: String) -> CatalogError {
    CatalogError::BadResponse { catalog: Catalog::Simbad, message }
}

/// Drops leading catalog markers such as `NAME ` or `* `
pub fn cleanup_object_name(name: &str) -> String {
    CATALOG_PREFIX.replace(name, "").trim().to_string()
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn names_query(names: &[String]) -> String {
    let filter = names.iter()
        .map(|n| format!("ident2.id={}", quote(n)))
        .collect::<Vec<_>>()
        .join(" OR ");

    format!("SELECT ident1.oidref, ident1.id, basic.main_id FROM ident AS ident1 \
             JOIN ident AS ident2 ON ident1.oidref = ident2.oidref \
             JOIN basic ON ident1.oidref = basic.oid WHERE {}", filter)
}

fn identifiers_query(identifiers: &[String]) -> String {
    let filter = identifiers.iter()
        .map(|id| format!("oid={}", quote(id)))
        .collect::<Vec<_>>()
        .join(" OR ");

    format!("SELECT oid, main_id, main_id FROM basic WHERE {}", filter)
}

fn position_query(coordinate: &Coordinate, radius: f64, max_results: usize) -> String {
    let (ra, dec) = (coordinate.ra, coordinate.dec);

    format!("SELECT TOP {max} oid, DISTANCE(POINT('ICRS', ra, dec), POINT('ICRS', {ra}, {dec})) AS dist \
             FROM basic \
             WHERE CONTAINS(POINT('ICRS', ra, dec), CIRCLE('ICRS', {ra}, {dec}, {radius})) = 1 \
             AND coo_bibcode IS NOT NULL AND ra IS NOT NULL AND dec IS NOT NULL \
             ORDER BY dist ASC", max = max_results, ra = ra, dec = dec, radius = radius)
}

fn rows(payload: &Value) -> Result<&Vec<Value>, CatalogError> {
    payload.get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| bad_response("no \"data\" array in the response".to_string()))
}

fn cell(row: &Value, idx: usize) -> Result<String, CatalogError> {
    match row.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        other => Err(bad_response(format!("unexpected value in column {}: {:?}", idx, other))),
    }
}

/// Every alias of every matched object, keyed by the cleaned upper-case alias
/// and again with its spaces removed
fn decode_name_rows(payload: &Value) -> Result<Records, CatalogError> {
    let mut records = Records::new();

    for row in rows(payload)? {
        let record = ObjectRecord { id: cell(row, 0)?, canonical: cleanup_object_name(cell(row, 2)?.as_str()) };
        let alias = cleanup_object_name(cell(row, 1)?.as_str()).to_uppercase();

        records.insert(alias.replace(' ', ""), record.clone());
        records.insert(alias, record);
    }

    Ok(records)
}

/// Picks the record for each requested name out of the alias map
fn select_names(names: &[String], aliases: &Records) -> Records {
    let mut selected = Records::new();

    for name in names {
        let key = cleanup_object_name(name).to_uppercase();

        match aliases.get(&key).or_else(|| aliases.get(&key.replace(' ', ""))) {
            Some(record) => { selected.insert(name.clone(), record.clone()); }
            None => debug!("SIMBAD has no entry for {}", name),
        }
    }

    // a single name can still be matched when SIMBAD spells it differently
    if names.len() == 1 && selected.is_empty() {
        let ids = aliases.values().map(|r| r.id.as_str()).collect::<HashSet<_>>();

        if ids.len() == 1 {
            if let Some(record) = aliases.values().next() {
                selected.insert(names[0].clone(), record.clone());
            }
        }
    }

    selected
}

fn decode_identifier_rows(payload: &Value) -> Result<Records, CatalogError> {
    rows(payload)?.iter()
        .map(|row| {
            let id = cell(row, 0)?;
            let canonical = cleanup_object_name(cell(row, 2)?.as_str());

            Ok((id.clone(), ObjectRecord { id, canonical }))
        })
        .collect()
}

/// Distinct oids, in the (distance) order SIMBAD returned them
fn decode_position_rows(payload: &Value) -> Result<Vec<String>, CatalogError> {
    let mut seen = HashSet::new();
    let mut oids = Vec::new();

    for row in rows(payload)? {
        let oid = cell(row, 0)?;

        if seen.insert(oid.clone()) {
            oids.push(oid);
        }
    }

    if oids.is_empty() {
        warn!("SIMBAD cone search returned no objects");
    }

    Ok(oids)
}
