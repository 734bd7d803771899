extern crate pest;
#[macro_use]
extern crate pest_derive;

pub mod logging;
pub mod catalog;
pub mod cache;
pub mod config;
pub mod position;
pub mod query_parser;

pub use catalog::{Catalog, UnsupportedSource, UNRESOLVED_ID};
pub use cache::TtlCache;
pub use position::{Coordinate, IncorrectPositionFormat, Position, PositionParser};
