use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

#[allow(unused_imports)]
use crate::logging::{debug, error, info, warn};
use crate::query_parser::{parse_query, Node, QueryError, Span};

/// Field whose values are astronomical object names
pub const OBJECT_FIELD: &str = "object";

lazy_static! {
    static ref BOOLEAN_IN_PHRASE: Regex = Regex::new(r"\s+(?:OR|AND)\s+").unwrap();
}

#[derive(Error, Debug)]
#[error("Unable to extract object names from query: {0}")]
pub struct ExtractionError(#[from] pub QueryError);

/// One `object:<expr>` occurrence in a query
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ObjectClause {
    /// The clause exactly as written in the query
    pub text: String,
    pub span: Span,
    /// Names found in this clause, in order of appearance
    pub names: Vec<String>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ExtractedObjects {
    /// Every distinct name, in order of first appearance
    pub names: Vec<String>,
    /// Every clause, in order of appearance; repeated clauses are kept
    pub clauses: Vec<ObjectClause>,
}

impl ExtractedObjects {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clause_texts(&self) -> Vec<&str> {
        self.clauses.iter().map(|c| c.text.as_str()).collect()
    }
}

/// Parses the query and collects every object name and `object:` clause in it
pub fn extract_objects(query: &str) -> Result<ExtractedObjects, ExtractionError> {
    let tree = parse_query(query)?;
    let extracted = extract_from_tree(&tree, query);

    debug!("Extracted names {:?} from clauses {:?}", extracted.names, extracted.clause_texts());

    Ok(extracted)
}

/// Walks an already parsed tree; `source` must be the string it was parsed from
pub fn extract_from_tree(tree: &Node, source: &str) -> ExtractedObjects {
    let mut extracted = ExtractedObjects::default();

    visit(tree, source, &mut extracted);

    extracted
}

fn visit(node: &Node, source: &str, extracted: &mut ExtractedObjects) {
    match node {
        Node::Field { name, expr, span } => {
            // only object fields matter, and we never look inside any other field
            if !name.eq_ignore_ascii_case(OBJECT_FIELD) {
                return;
            }

            let mut names = Vec::new();
            clause_names(expr, &mut names);

            for name in &names {
                if !extracted.names.contains(name) {
                    extracted.names.push(name.clone());
                }
            }

            let text = source.get(span.start..span.end)
                .map(|s| s.to_string())
                .unwrap_or_else(|| node.to_string());

            extracted.clauses.push(ObjectClause { text, span: *span, names });
        }
        Node::Group(expr) | Node::FieldGroup(expr) => visit(expr, source, extracted),
        Node::Unary { expr, .. } | Node::Boost { expr, .. } | Node::Approx { expr, .. } => visit(expr, source, extracted),
        Node::Operation { operands, .. } => {
            for operand in operands {
                visit(operand, source, extracted);
            }
        }
        Node::Word(_) | Node::Phrase(_) | Node::Range { .. } => (),
    }
}

/// Names held by the value of an object clause.
/// A lone quoted value containing OR/AND is split into its parts.
fn clause_names(expr: &Node, names: &mut Vec<String>) {
    match expr {
        Node::Phrase(phrase) => {
            for part in BOOLEAN_IN_PHRASE.split(unquote(phrase)) {
                push_name(part, names);
            }
        }
        other => collect_names(other, names),
    }
}

fn collect_names(node: &Node, names: &mut Vec<String>) {
    match node {
        Node::Word(word) => push_name(word, names),
        Node::Phrase(phrase) => push_name(unquote(phrase), names),
        Node::Group(expr) | Node::FieldGroup(expr) => collect_names(expr, names),
        Node::Unary { expr, .. } | Node::Boost { expr, .. } | Node::Approx { expr, .. } => collect_names(expr, names),
        Node::Operation { operands, .. } => {
            for operand in operands {
                collect_names(operand, names);
            }
        }
        Node::Field { name, expr, .. } if name.eq_ignore_ascii_case(OBJECT_FIELD) => collect_names(expr, names),
        Node::Field { .. } | Node::Range { .. } => (),
    }
}

fn unquote(phrase: &str) -> &str {
    phrase.strip_prefix('"').and_then(|p| p.strip_suffix('"')).unwrap_or(phrase)
}

fn push_name(name: &str, names: &mut Vec<String>) {
    let name = name.trim();

    if !name.is_empty() {
        names.push(name.to_string());
    }
}
