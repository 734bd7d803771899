use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Datelike;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use common::config::ConfigFile;
use common::logging::{debug, error, info};
use common::query_parser::{extract_objects, object_expression, restrict_to_astronomy, rewrite_clauses, IdentifierMap};
use common::{Catalog, PositionParser, TtlCache, UNRESOLVED_ID};

use crate::catalogs::{create_resolvers, Resolvers};
use crate::cone_search::{ConeSearch, ConeSearchOutcome};
use crate::error::{CatalogError, IndexError, ObjectError};
use crate::index::{IndexType, SolrIndex};
use crate::resolver::{bounded, ObjectRecord, Records, ResolverType};

/// Name or identifier lookup against a single catalog
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ResolveRequest {
    /// "simbad" (the default) or "ned"
    pub source: Option<String>,
    pub objects: Option<Vec<String>>,
    pub identifiers: Option<Vec<String>>,
    /// `<position>[:<radius>]`, used when no names or identifiers are given
    pub position: Option<String>,
}

/// Input key -> record, or null when the catalog does not know it
pub type ResolvedRecords = BTreeMap<String, Option<ObjectRecord>>;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ResolveResponse {
    Records(ResolvedRecords),
    Position(PositionResponse),
}

/// Cone-search result: identifiers per catalog name plus the identifier query
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PositionResponse {
    pub data: BTreeMap<String, Vec<String>>,
    pub query: String,
}

impl From<ConeSearchOutcome> for PositionResponse {
    fn from(outcome: ConeSearchOutcome) -> Self {
        PositionResponse {
            data: outcome.identifiers.into_iter().map(|(catalog, ids)| (catalog.name().to_string(), ids)).collect(),
            query: outcome.query,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum QueryInput {
    Single(String),
    /// Only the first query is used
    List(Vec<String>),
}

#[derive(Deserialize, Debug, Clone)]
pub struct QueryRequest {
    pub query: QueryInput,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub query: String,
}

/// Publications about objects known to NED
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ReferenceRequest {
    pub objects: Vec<String>,
    /// Defaults to 1800
    pub start_year: Option<i32>,
    /// Defaults to the current year
    pub end_year: Option<i32>,
    /// Bibstems to restrict to
    pub journals: Option<Vec<String>>,
    /// e.g. "refereed"
    pub refereed_status: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReferenceResponse {
    /// One `{name: [aliases]}` entry per name NED found ambiguous
    pub ambiguous: Vec<BTreeMap<String, Vec<String>>>,
    /// Bibcodes
    pub data: Vec<String>,
}

const FIRST_YEAR: i32 = 1800;

pub struct ObjectService {
    targets: Vec<Catalog>,
    parser: PositionParser,
    resolvers: Resolvers,
    index: Option<Arc<IndexType>>,
    verify_cones: bool,
    name_cache: TtlCache<(Catalog, String), ObjectRecord>,
}

impl ObjectService {
    /// Service backed by the real catalogs and search index
    pub fn from_config(config: &ConfigFile) -> anyhow::Result<Self> {
        let resolvers = create_resolvers(config)?;
        let index: Arc<IndexType> = Arc::new(SolrIndex::new(&config.index)?);

        ObjectService::new(config, resolvers, Some(index))
    }

    pub fn new(config: &ConfigFile, resolvers: Resolvers, index: Option<Arc<IndexType>>) -> anyhow::Result<Self> {
        Ok(ObjectService {
            targets: config.target_catalogs()?,
            parser: PositionParser::new(config.default_radius),
            resolvers,
            index,
            verify_cones: config.index.verify,
            name_cache: TtlCache::new(config.cache_ttl()),
        })
    }

    fn cone_search(&self) -> ConeSearch<'_> {
        let index = if self.verify_cones { self.index.as_deref() } else { None };

        ConeSearch::new(&self.parser, &self.resolvers, index)
    }

    fn resolver(&self, catalog: Catalog) -> Result<&Arc<ResolverType>, ObjectError> {
        self.resolvers.get(&catalog)
            .ok_or_else(|| ObjectError::NoInputProvided(format!("No resolver configured for {}", catalog)))
    }

    /// Looks up object names or identifiers in one catalog, or runs a cone search
    pub async fn resolve(&self, request: ResolveRequest) -> Result<ResolveResponse, ObjectError> {
        let catalog = match &request.source {
            Some(source) => source.parse::<Catalog>()?,
            None => Catalog::Simbad,
        };

        let (keys, by_identifier) = match (request.objects, request.identifiers, request.position) {
            (Some(objects), _, _) if !objects.is_empty() => (objects, false),
            (_, Some(identifiers), _) if !identifiers.is_empty() => (identifiers, true),
            (_, _, Some(position)) if !position.trim().is_empty() => {
                return Ok(ResolveResponse::Position(self.position_search(position.as_str()).await?));
            }
            _ => return Err(ObjectError::NoInputProvided("No identifiers/objects found in POST body".to_string())),
        };

        info!("Resolving {} {} with {}", keys.len(), if by_identifier { "identifiers" } else { "objects" }, catalog);

        let records = if by_identifier {
            let resolver = self.resolver(catalog)?;
            bounded(catalog, resolver.timeout(), resolver.resolve_identifiers(&keys)).await?
        } else {
            self.cached_names(catalog, &keys).await?
        };

        Ok(ResolveResponse::Records(keys.into_iter()
            .map(|k| {
                let record = records.get(&k).cloned();
                (k, record)
            })
            .collect()))
    }

    /// Cone search around `<position>[:<radius>]`
    pub async fn position_search(&self, position_str: &str) -> Result<PositionResponse, ObjectError> {
        info!("Position search: {}", position_str);

        let outcome = self.cone_search().run(position_str).await?;

        Ok(outcome.into())
    }

    /// Bibcodes of the publications about the objects, found through their NED names
    pub async fn ned_references(&self, request: ReferenceRequest) -> Result<ReferenceResponse, ObjectError> {
        if request.objects.is_empty() {
            return Err(ObjectError::NoInputProvided("No object names provided".to_string()));
        }

        info!("NED reference search for {} object(s)", request.objects.len());

        let resolver = self.resolver(Catalog::Ned)?;
        let found = bounded(Catalog::Ned, resolver.timeout(), resolver.lookup_names(&request.objects)).await?;

        let ambiguous = found.ambiguous.into_iter()
            .map(|(name, aliases)| {
                let mut entry = BTreeMap::new();
                entry.insert(name, aliases);
                entry
            })
            .collect::<Vec<_>>();

        // input order, each NED object once
        let mut ids = Vec::new();
        for name in &request.objects {
            if let Some(record) = found.records.get(name) {
                if !ids.contains(&record.id) {
                    ids.push(record.id.clone());
                }
            }
        }

        if ids.is_empty() {
            info!("NED knows none of {:?}", request.objects);
            return Ok(ReferenceResponse { ambiguous, data: Vec::new() });
        }

        let query = reference_query(&ids, &request, chrono::Local::now().year());

        let index = self.index.as_ref()
            .ok_or_else(|| IndexError::Transport("no search index configured".to_string()))?;

        let data = index.search_bibcodes(query.as_str()).await?;
        debug!("{} bibcode(s) for {}", data.len(), query);

        Ok(ReferenceResponse { ambiguous, data })
    }

    /// Rewrites every `object:` clause in the query into full-text and identifier clauses
    pub async fn translate(&self, request: QueryRequest) -> Result<QueryResponse, ObjectError> {
        let query = match request.query {
            QueryInput::Single(query) => query,
            QueryInput::List(queries) => queries.into_iter().next().unwrap_or_default(),
        };

        if query.trim().is_empty() {
            return Err(ObjectError::NoInputProvided("No query found in POST body".to_string()));
        }

        info!("Translating query: {}", query);

        let extracted = extract_objects(query.as_str())?;

        if extracted.is_empty() {
            debug!("No object clauses in {}", query);
            return Ok(QueryResponse { query });
        }

        if extracted.names.is_empty() {
            return Err(ObjectError::NoInputProvided(format!("No object names found in query: {}", query)));
        }

        // a clause holding a single position string becomes a cone search
        let mut cone_clauses = HashMap::new();

        for (i, clause) in extracted.clauses.iter().enumerate() {
            if let [name] = clause.names.as_slice() {
                if let Ok(position) = self.parser.parse(name) {
                    let expr = match self.cone_search().search(position).await {
                        Ok(outcome) => outcome.query,
                        Err(e) => {
                            error!("Cone search for {} failed: {}", name, e);
                            unresolved_cone_query()
                        }
                    };

                    cone_clauses.insert(i, restrict_to_astronomy(expr.as_str()));
                }
            }
        }

        // names still needed by at least one clause that is not a cone search
        let names = extracted.names.iter()
            .filter(|n| {
                extracted.clauses.iter()
                    .enumerate()
                    .any(|(i, clause)| !cone_clauses.contains_key(&i) && clause.names.contains(n))
            })
            .cloned()
            .collect::<Vec<_>>();

        let translations = self.object_translations(&names).await;

        let rewritten = rewrite_clauses(query.as_str(), &extracted.clauses, |i, clause| {
            match cone_clauses.get(&i) {
                Some(expr) => expr.clone(),
                None => object_expression(clause, &names, &self.targets, &translations),
            }
        });

        info!("Translated query: {}", rewritten);

        Ok(QueryResponse { query: rewritten })
    }

    /// Identifier of every name in every target catalog; failed lookups map to the unresolved id
    async fn object_translations(&self, names: &[String]) -> IdentifierMap {
        let lookups = self.targets.iter()
            .flat_map(|catalog| names.iter().map(move |name| (*catalog, name)))
            .map(|(catalog, name)| async move {
                let res = self.cached_names(catalog, std::slice::from_ref(name)).await;
                (catalog, name, res)
            });

        let mut translations = IdentifierMap::new();

        for (catalog, name, res) in join_all(lookups).await {
            let id = match res {
                Ok(records) => records.get(name).map(|r| r.id.clone()),
                Err(e) => {
                    error!("Failed to find data for {} object {}: {}", catalog, name, e);
                    None
                }
            };

            translations.entry(catalog)
                .or_insert_with(HashMap::new)
                .insert(name.clone(), id.unwrap_or_else(|| UNRESOLVED_ID.to_string()));
        }

        translations
    }

    /// Name lookups through the cache; only misses reach the catalog
    async fn cached_names(&self, catalog: Catalog, names: &[String]) -> Result<Records, CatalogError> {
        let mut records = Records::new();
        let mut misses = Vec::new();

        for name in names {
            match self.name_cache.get(&(catalog, name.to_uppercase())) {
                Some(record) => { records.insert(name.clone(), record); }
                None => misses.push(name.clone()),
            }
        }

        if misses.is_empty() {
            debug!("All {} name(s) found in the {} cache", names.len(), catalog);
            return Ok(records);
        }

        let resolver = match self.resolvers.get(&catalog) {
            Some(resolver) => resolver,
            None => return Err(CatalogError::Transport { catalog, message: "no resolver configured".to_string() }),
        };

        let found = bounded(catalog, resolver.timeout(), resolver.resolve_names(&misses)).await?;

        for (name, record) in found {
            self.name_cache.insert((catalog, name.to_uppercase()), record.clone());
            records.insert(name, record);
        }

        Ok(records)
    }
}

/// `nedid:A OR nedid:B year:1800-2024 bibstem:(ApJ OR A&A) property:refereed`
fn reference_query(ids: &[String], request: &ReferenceRequest, current_year: i32) -> String {
    let mut query = ids.iter()
        .map(|id| format!("{}:{}", Catalog::Ned.field(), id))
        .collect::<Vec<_>>()
        .join(" OR ");

    query.push_str(format!(
        " year:{}-{}",
        request.start_year.unwrap_or(FIRST_YEAR),
        request.end_year.unwrap_or(current_year)
    ).as_str());

    if let Some(journals) = request.journals.as_ref().filter(|j| !j.is_empty()) {
        query.push_str(format!(" bibstem:({})", journals.join(" OR ")).as_str());
    }

    if let Some(status) = &request.refereed_status {
        query.push_str(format!(" property:{}", status).as_str());
    }

    query
}

/// `simbid:0 OR nedid:0`, matching nothing
fn unresolved_cone_query() -> String {
    Catalog::ALL.iter()
        .map(|catalog| format!("{}:{}", catalog.field(), UNRESOLVED_ID))
        .collect::<Vec<_>>()
        .join(" OR ")
}
