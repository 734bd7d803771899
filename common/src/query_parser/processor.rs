use std::fmt::{Display, Formatter};

use pest::iterators::Pair;
use serde::Serialize;
use thiserror::Error;

#[allow(unused_imports)]
use crate::logging::{debug, error, info, warn};

use crate::query_parser::Rule;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unbalanced parentheses in query: {0}")]
    UnbalancedQuery(String),

    #[error(transparent)]
    SyntaxError(#[from] pest::error::Error<Rule>),

    #[error("Expected token: {0}")]
    UnexpectedMissingToken(String),

    #[error("Unexpected rule: {0:?}")]
    UnexpectedRule(Rule),
}

/// Byte offsets of a node in the original query string
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl From<pest::Span<'_>> for Span {
    fn from(span: pest::Span<'_>) -> Self {
        Span { start: span.start(), end: span.end() }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    /// Juxtaposed terms with no explicit operator
    Implicit,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Plus,
    Minus,
}

/// A node in the parsed query tree
#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum Node {
    Word(String),
    /// Quoted phrase, quotes included
    Phrase(String),
    Field { name: String, expr: Box<Node>, span: Span },
    Group(Box<Node>),
    /// Parenthesized value of a field: `field:(a OR b)`
    FieldGroup(Box<Node>),
    Operation { op: Operator, operands: Vec<Node> },
    Unary { op: UnaryOperator, expr: Box<Node> },
    Boost { expr: Box<Node>, factor: Option<String> },
    /// Fuzzy term or proximity phrase: `term~`, `"a b"~3`
    Approx { expr: Box<Node>, degree: Option<String> },
    Range { low: Box<Node>, high: Box<Node>, include_low: bool, include_high: bool },
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Word(w) | Node::Phrase(w) => write!(f, "{}", w),
            Node::Field { name, expr, .. } => write!(f, "{}:{}", name, expr),
            Node::Group(expr) | Node::FieldGroup(expr) => write!(f, "({})", expr),
            Node::Operation { op, operands } => {
                let sep = match op {
                    Operator::And => " AND ",
                    Operator::Or => " OR ",
                    Operator::Implicit => " ",
                };

                write!(f, "{}", operands.iter().map(|o| o.to_string()).collect::<Vec<_>>().join(sep))
            }
            Node::Unary { op, expr } => match op {
                UnaryOperator::Not => write!(f, "NOT {}", expr),
                UnaryOperator::Plus => write!(f, "+{}", expr),
                UnaryOperator::Minus => write!(f, "-{}", expr),
            },
            Node::Boost { expr, factor } => write!(f, "{}^{}", expr, factor.as_deref().unwrap_or("")),
            Node::Approx { expr, degree } => write!(f, "{}~{}", expr, degree.as_deref().unwrap_or("")),
            Node::Range { low, high, include_low, include_high } => {
                write!(f, "{}{} TO {}{}",
                       if *include_low { "[" } else { "{" },
                       low,
                       high,
                       if *include_high { "]" } else { "}" })
            }
        }
    }
}

fn missing_token(token: &str) -> QueryError {
    QueryError::UnexpectedMissingToken(token.to_string())
}

/// Converts the top-level `query` pair into a [Node] tree
pub fn build_tree(query_pair: Pair<Rule>) -> Result<Node, QueryError> {
    let expr = query_pair.into_inner()
        .find(|p| p.as_rule() == Rule::or_expr)
        .ok_or_else(|| missing_token("expression"))?;

    process_expr(expr)
}

fn process_expr(pair: Pair<Rule>) -> Result<Node, QueryError> {
    let op = match pair.as_rule() {
        Rule::or_expr => Operator::Or,
        Rule::implicit_expr => Operator::Implicit,
        Rule::and_expr => Operator::And,
        Rule::unary => return process_unary(pair),
        rule => return Err(QueryError::UnexpectedRule(rule)),
    };

    let mut operands = pair.into_inner()
        .filter(|p| !matches!(p.as_rule(), Rule::or_op | Rule::and_op))
        .map(process_expr)
        .collect::<Result<Vec<_>, _>>()?;

    // collapse single-operand levels so the tree only has real operations
    if operands.len() == 1 {
        return operands.pop().ok_or_else(|| missing_token("operand"));
    }

    Ok(Node::Operation { op, operands })
}

fn process_unary(pair: Pair<Rule>) -> Result<Node, QueryError> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| missing_token("term"))?;

    let op = match first.as_rule() {
        Rule::not_op => UnaryOperator::Not,
        Rule::plus_op => UnaryOperator::Plus,
        Rule::minus_op => UnaryOperator::Minus,
        Rule::modified => return process_modified(first),
        rule => return Err(QueryError::UnexpectedRule(rule)),
    };

    let operand = inner.next().ok_or_else(|| missing_token("operand"))?;

    Ok(Node::Unary { op, expr: Box::new(process_unary(operand)?) })
}

fn process_modified(pair: Pair<Rule>) -> Result<Node, QueryError> {
    let mut inner = pair.into_inner();
    let mut node = process_atom(inner.next().ok_or_else(|| missing_token("term"))?)?;

    for modifier in inner {
        let rule = modifier.as_rule();
        let value = modifier.into_inner().next().map(|n| n.as_str().to_string());

        node = match rule {
            Rule::boost => Node::Boost { expr: Box::new(node), factor: value },
            Rule::approx => Node::Approx { expr: Box::new(node), degree: value },
            rule => return Err(QueryError::UnexpectedRule(rule)),
        };
    }

    Ok(node)
}

fn process_atom(pair: Pair<Rule>) -> Result<Node, QueryError> {
    match pair.as_rule() {
        Rule::field => {
            let span = Span::from(pair.as_span());
            let mut inner = pair.into_inner();
            let name = inner.next().ok_or_else(|| missing_token("field name"))?.as_str().to_string();
            let value = inner.next().ok_or_else(|| missing_token("field value"))?;

            Ok(Node::Field { name, expr: Box::new(process_atom(value)?), span })
        }
        Rule::group => Ok(Node::Group(Box::new(process_inner_expr(pair)?))),
        Rule::field_group => Ok(Node::FieldGroup(Box::new(process_inner_expr(pair)?))),
        Rule::range => process_range(pair),
        Rule::phrase => Ok(Node::Phrase(pair.as_str().to_string())),
        Rule::word | Rule::value_word | Rule::range_word => Ok(Node::Word(pair.as_str().to_string())),
        rule => Err(QueryError::UnexpectedRule(rule)),
    }
}

fn process_inner_expr(pair: Pair<Rule>) -> Result<Node, QueryError> {
    let expr = pair.into_inner().next().ok_or_else(|| missing_token("expression"))?;

    process_expr(expr)
}

fn process_range(pair: Pair<Rule>) -> Result<Node, QueryError> {
    let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::to_kw);

    let open = inner.next().ok_or_else(|| missing_token("["))?;
    let low = process_atom(inner.next().ok_or_else(|| missing_token("lower bound"))?)?;
    let high = process_atom(inner.next().ok_or_else(|| missing_token("upper bound"))?)?;
    let close = inner.next().ok_or_else(|| missing_token("]"))?;

    Ok(Node::Range {
        low: Box::new(low),
        high: Box::new(high),
        include_low: open.as_str() == "[",
        include_high: close.as_str() == "]",
    })
}
