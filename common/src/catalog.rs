use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier substituted for names a catalog could not resolve; it matches nothing in the index
pub const UNRESOLVED_ID: &str = "0";

/// Field prefix used for the full-text variant of an object clause
pub const FULLTEXT_PREFIX: &str = "=abs:";

/// Clause restricting the rewritten object expressions to the astronomy collection
pub const DATABASE_RESTRICTION: &str = "database:astronomy";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Do not have method to get object data for this service: {0}")]
pub struct UnsupportedSource(pub String);

/// The two name catalogs the service knows how to talk to
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Catalog {
    /// SIMBAD: numeric object ids (oid)
    Simbad,
    /// NED: string ids, the preferred name with spaces replaced by underscores
    Ned,
}

impl Catalog {
    pub const ALL: [Catalog; 2] = [Catalog::Simbad, Catalog::Ned];

    /// Lower-case source name, as used in requests and the config file
    pub fn name(&self) -> &'static str {
        match self {
            Catalog::Simbad => "simbad",
            Catalog::Ned => "ned",
        }
    }

    /// Name of the index field holding this catalog's identifiers
    pub fn field(&self) -> &'static str {
        match self {
            Catalog::Simbad => "simbid",
            Catalog::Ned => "nedid",
        }
    }

    /// Field prefix, including the colon
    pub fn field_prefix(&self) -> String {
        format!("{}:", self.field())
    }
}

impl Display for Catalog {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name().to_ascii_uppercase())
    }
}

impl FromStr for Catalog {
    type Err = UnsupportedSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simbad" => Ok(Catalog::Simbad),
            "ned" => Ok(Catalog::Ned),
            _ => Err(UnsupportedSource(s.to_string()))
        }
    }
}
