use std::collections::{BTreeMap, HashSet};

use futures::future::join_all;
use serde::Serialize;

use common::logging::{debug, info, warn};
use common::{Catalog, Position, PositionParser};

use crate::catalogs::Resolvers;
use crate::error::{CatalogError, ObjectError};
use crate::index::IndexType;
use crate::resolver::bounded;

/// Result of a cone search across the catalogs
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ConeSearchOutcome {
    pub position: Position,
    /// Identifiers per catalog, nearest first; catalogs that failed are absent
    pub identifiers: BTreeMap<Catalog, Vec<String>>,
    /// `simbid:(...) OR nedid:(...)`
    pub query: String,
}

type CatalogResults = Vec<(Catalog, Result<Vec<String>, CatalogError>)>;

enum Stage {
    Parsing(String),
    Resolving(Position),
    Merging(Position, CatalogResults),
    Merged(ConeSearchOutcome),
}

/// Queries every catalog around a position and merges what comes back
pub struct ConeSearch<'a> {
    parser: &'a PositionParser,
    resolvers: &'a Resolvers,
    index: Option<&'a IndexType>,
}

impl<'a> ConeSearch<'a> {
    /// With an index, identifiers are kept only when the index knows them
    pub fn new(parser: &'a PositionParser, resolvers: &'a Resolvers, index: Option<&'a IndexType>) -> Self {
        ConeSearch { parser, resolvers, index }
    }

    /// Parses `<position>[:<radius>]` and searches around it
    pub async fn run(&self, position_str: &str) -> Result<ConeSearchOutcome, ObjectError> {
        self.drive(Stage::Parsing(position_str.to_string())).await
    }

    pub async fn search(&self, position: Position) -> Result<ConeSearchOutcome, ObjectError> {
        self.drive(Stage::Resolving(position)).await
    }

    async fn drive(&self, mut stage: Stage) -> Result<ConeSearchOutcome, ObjectError> {
        loop {
            stage = match stage {
                Stage::Parsing(position_str) => Stage::Resolving(self.parser.parse(position_str.as_str())?),
                Stage::Resolving(position) => {
                    let results = self.query_catalogs(&position).await;
                    Stage::Merging(position, results)
                }
                Stage::Merging(position, results) => Stage::Merged(self.merge(position, results).await?),
                Stage::Merged(outcome) => return Ok(outcome),
            }
        }
    }

    /// Both catalogs are queried at the same time, each with its own radius cap and timeout
    async fn query_catalogs(&self, position: &Position) -> CatalogResults {
        let lookups = Catalog::ALL.iter().map(|catalog| async move {
            let res = match self.resolvers.get(catalog) {
                Some(resolver) => {
                    let clamped = position.clamped(resolver.max_radius());

                    if clamped.radius < position.radius {
                        debug!("{} radius capped at {} degrees", catalog, clamped.radius);
                    }

                    bounded(
                        *catalog,
                        resolver.timeout(),
                        resolver.resolve_by_position(&clamped.coordinate, clamped.radius, resolver.max_results()),
                    ).await
                }
                None => Err(CatalogError::Transport { catalog: *catalog, message: "no resolver configured".to_string() }),
            };

            (*catalog, res)
        });

        join_all(lookups).await
    }

    async fn merge(&self, position: Position, results: CatalogResults) -> Result<ConeSearchOutcome, ObjectError> {
        let mut identifiers = BTreeMap::new();
        let mut failures = Vec::new();

        for (catalog, res) in results {
            let ids = match res {
                Ok(ids) => dedupe(ids),
                Err(e) => {
                    warn!("{} cone search failed: {}", catalog, e);
                    failures.push((catalog, e.to_string()));
                    continue;
                }
            };

            if ids.is_empty() {
                failures.push((catalog, "no objects found".to_string()));
                continue;
            }

            if let Some(index) = self.index {
                match index.verify_identifiers_indexed(catalog.field(), &ids).await {
                    Ok(true) => (),
                    Ok(false) => {
                        info!("None of the {} {} identifiers are in the index", ids.len(), catalog);
                        failures.push((catalog, "no indexed objects found".to_string()));
                        continue;
                    }
                    Err(e) => warn!("Unable to verify {} identifiers against the index: {}", catalog, e),
                }
            }

            identifiers.insert(catalog, ids);
        }

        if identifiers.is_empty() {
            return Err(ObjectError::BothCatalogsFailed(failures));
        }

        let query = identifiers.iter()
            .map(|(catalog, ids)| format!("{}:({})", catalog.field(), ids.join(" OR ")))
            .collect::<Vec<_>>()
            .join(" OR ");

        Ok(ConeSearchOutcome { position, identifiers, query })
    }
}

fn dedupe(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();

    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
