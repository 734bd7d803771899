mod processor;
mod extractor;
mod rewriter;

use pest::Parser;
pub use crate::query_parser::processor::{
    Node,
    Operator,
    UnaryOperator,
    QueryError,
    Span,
};
pub use crate::query_parser::extractor::{
    extract_objects,
    extract_from_tree,
    ExtractedObjects,
    ExtractionError,
    ObjectClause,
    OBJECT_FIELD,
};
pub use crate::query_parser::rewriter::{
    rewrite_clauses,
    translate_query,
    object_expression,
    restrict_to_astronomy,
    IdentifierMap,
};

#[allow(unused_imports)]
use crate::logging::{debug, error, info, warn};

#[derive(Parser)]
#[grammar="query_parser/query_grammar.pest"]
struct QueryParser;

/// True when every `)` closes an earlier `(` and nothing is left open.
/// Only parenthesis characters are looked at, quoted or not.
pub fn is_balanced(query: &str) -> bool {
    let mut depth = 0usize;

    for c in query.chars().filter(|c| matches!(c, '(' | ')')) {
        if c == '(' {
            depth += 1;
        } else if depth == 0 {
            return false;
        } else {
            depth -= 1;
        }
    }

    depth == 0
}

pub fn check_balanced(query: &str) -> Result<(), QueryError> {
    if is_balanced(query) {
        Ok(())
    } else {
        Err(QueryError::UnbalancedQuery(query.to_string()))
    }
}

/// Given a search query, build its [Node] tree
pub fn parse_query(query: &str) -> Result<Node, QueryError> {
    debug!("Attempting to parse query: {}", query);

    check_balanced(query)?;

    let query_pair = QueryParser::parse(Rule::query, query)?
        .next()
        .ok_or_else(|| QueryError::UnexpectedMissingToken("query".to_string()))?;

    processor::build_tree(query_pair)
}

#[cfg(test)]
mod query_parser_tests {
    use crate::logging::init_test_logger;
    use crate::query_parser::{is_balanced, parse_query, Node, Operator, QueryError, UnaryOperator};

    fn word(w: &str) -> Node {
        Node::Word(w.to_string())
    }

    #[test]
    fn balanced_parentheses() {
        assert!(is_balanced("object:((a OR b) AND c)"));
        assert!(is_balanced("no parens at all"));
        assert!(is_balanced("title:\"(smiley :)\""));
        assert!(!is_balanced("title:\"smiley :)\""));
        assert!(!is_balanced("title:\"x)\""));
        assert!(!is_balanced("object:((a OR b)"));
        assert!(!is_balanced(")("));
    }

    #[test]
    fn unbalanced_query_is_rejected_before_parsing() {
        init_test_logger();

        let err = parse_query("citations(object:M31").unwrap_err();

        assert!(matches!(err, QueryError::UnbalancedQuery(_)));
    }

    #[test]
    fn reserved_words_as_values() {
        init_test_logger();

        for ok in ["foo:TO", "foo:TO*", "foo:NOT*", "foo:\"TO AND OR\"", "foo:ORANGE"] {
            assert!(parse_query(ok).is_ok(), "expected {} to parse", ok);
        }

        for bad in ["foo:NOT", "foo:AND", "foo:OR", "OR", "AND"] {
            let res = parse_query(bad);
            assert!(matches!(res, Err(QueryError::SyntaxError(_))), "expected {} to fail", bad);
        }
    }

    #[test]
    fn mixed_operations() {
        init_test_logger();

        let tree = parse_query("subject:test desc:(house OR car) AND NOT \"x\"~3").unwrap();

        match &tree {
            Node::Operation { op: Operator::Implicit, operands } => {
                assert_eq!(2, operands.len());
                assert!(matches!(&operands[0], Node::Field { name, .. } if name == "subject"));

                match &operands[1] {
                    Node::Operation { op: Operator::And, operands } => {
                        assert!(matches!(&operands[0], Node::Field { name, expr, .. }
                            if name == "desc" && matches!(expr.as_ref(), Node::FieldGroup(_))));
                        assert!(matches!(&operands[1], Node::Unary { op: UnaryOperator::Not, expr }
                            if matches!(expr.as_ref(), Node::Approx { degree: Some(d), .. } if d == "3")));
                    }
                    other => panic!("Expected AND, got {:?}", other),
                }
            }
            other => panic!("Expected implicit operation, got {:?}", other),
        }

        assert_eq!("subject:test desc:(house OR car) AND NOT \"x\"~3", tree.to_string());
    }

    #[test]
    fn precedence() {
        init_test_logger();

        // OR binds loosest, then juxtaposition, then AND
        let tree = parse_query("a b AND c OR d").unwrap();

        assert_eq!(
            Node::Operation {
                op: Operator::Or,
                operands: vec![
                    Node::Operation {
                        op: Operator::Implicit,
                        operands: vec![
                            word("a"),
                            Node::Operation { op: Operator::And, operands: vec![word("b"), word("c")] },
                        ],
                    },
                    word("d"),
                ],
            },
            tree
        );
    }

    #[test]
    fn ranges() {
        init_test_logger();

        let tree = parse_query("foo:[10 TO 100]").unwrap();
        assert!(matches!(&tree, Node::Field { expr, .. }
            if matches!(expr.as_ref(), Node::Range { include_low: true, include_high: true, .. })));

        let tree = parse_query("bar:[a* TO *}").unwrap();
        assert_eq!("bar:[a* TO *}", tree.to_string());
        assert!(matches!(&tree, Node::Field { expr, .. }
            if matches!(expr.as_ref(), Node::Range { include_low: true, include_high: false, .. })));

        let tree = parse_query("somedate:[now/d-1d+7H TO now/d+7H]").unwrap();
        assert_eq!("somedate:[now/d-1d+7H TO now/d+7H]", tree.to_string());
    }

    #[test]
    fn dates_and_modifiers() {
        init_test_logger();

        let tree = parse_query("foo:2015-12-19T22:30:45.234Z").unwrap();
        assert!(matches!(&tree, Node::Field { expr, .. } if **expr == word("2015-12-19T22:30:45.234Z")));

        assert!(parse_query("foo:2015-12-19||+2\\d").is_ok());

        let tree = parse_query("\"foo bar\"~3 \"foo baz\"~ baz~0.3 fou~ title:sky^2").unwrap();
        assert_eq!("\"foo bar\"~3 \"foo baz\"~ baz~0.3 fou~ title:sky^2", tree.to_string());
    }

    #[test]
    fn functions_and_prefixes() {
        init_test_logger();

        let query = "citations(object:M31 OR fulltext:SMC) -foo:bar +=abs:Andromeda";
        let tree = parse_query(query).unwrap();

        match &tree {
            Node::Operation { op: Operator::Implicit, operands } => {
                assert_eq!(word("citations"), operands[0]);
                assert!(matches!(&operands[1], Node::Group(_)));
                assert!(matches!(&operands[2], Node::Unary { op: UnaryOperator::Minus, .. }));
                assert!(matches!(&operands[3], Node::Unary { op: UnaryOperator::Plus, expr }
                    if matches!(expr.as_ref(), Node::Field { name, .. } if name == "=abs")));
            }
            other => panic!("Expected implicit operation, got {:?}", other),
        }
    }

    #[test]
    fn field_spans_cover_the_clause() {
        init_test_logger();

        let query = "year:2010 object:(\"M 1\" OR M81)";
        let tree = parse_query(query).unwrap();

        match &tree {
            Node::Operation { operands, .. } => match &operands[1] {
                Node::Field { span, .. } => assert_eq!("object:(\"M 1\" OR M81)", &query[span.start..span.end]),
                other => panic!("Expected field, got {:?}", other),
            },
            other => panic!("Expected operation, got {:?}", other),
        }
    }
}
