use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::catalog::{Catalog, DATABASE_RESTRICTION, FULLTEXT_PREFIX, UNRESOLVED_ID};
#[allow(unused_imports)]
use crate::logging::{debug, error, info, warn};
use crate::query_parser::ObjectClause;

/// catalog -> object name -> catalog identifier
pub type IdentifierMap = HashMap<Catalog, HashMap<String, String>>;

lazy_static! {
    static ref OBJECT_PREFIX: Regex = Regex::new(r"(?i)(^|[\s(+\-])object\s*:").unwrap();
}

/// Replaces each clause, in order, at its first remaining occurrence in the query.
/// Clauses whose text can no longer be found are left alone.
pub fn rewrite_clauses<F>(query: &str, clauses: &[ObjectClause], mut replacement: F) -> String
    where F: FnMut(usize, &ObjectClause) -> String
{
    let mut rewritten = query.to_string();

    for (i, clause) in clauses.iter().enumerate() {
        let start = match rewritten.find(clause.text.as_str()) {
            Some(start) => start,
            None => {
                warn!("Could not find clause '{}' in query '{}'", clause.text, rewritten);
                continue;
            }
        };

        let new_text = replacement(i, clause);

        debug!("Rewriting '{}' to '{}'", clause.text, new_text);
        rewritten.replace_range(start..start + clause.text.len(), new_text.as_str());
    }

    rewritten
}

/// `((<expr>) database:astronomy)`
pub fn restrict_to_astronomy(expr: &str) -> String {
    format!("(({}) {})", expr, DATABASE_RESTRICTION)
}

/// The full replacement for one object clause: a full-text variant plus one
/// identifier variant per target catalog, restricted to the astronomy collection
pub fn object_expression(clause: &ObjectClause, names: &[String], targets: &[Catalog], translations: &IdentifierMap) -> String {
    let mut variants = vec![retarget(&clause.text, FULLTEXT_PREFIX)];

    for catalog in targets {
        let ids = translations.get(catalog);
        let variant = retarget(&clause.text, catalog.field_prefix().as_str());

        variants.push(substitute_names(&variant, names, |name| {
            ids.and_then(|m| m.get(name))
                .cloned()
                .unwrap_or_else(|| UNRESOLVED_ID.to_string())
        }));
    }

    restrict_to_astronomy(variants.join(" OR ").as_str())
}

/// Rewrites every object clause of the query into its identifier expression
pub fn translate_query(query: &str, clauses: &[ObjectClause], names: &[String], targets: &[Catalog], translations: &IdentifierMap) -> String {
    rewrite_clauses(query, clauses, |_, clause| object_expression(clause, names, targets, translations))
}

/// Swaps every `object:` field prefix in the clause for `prefix`
fn retarget(clause: &str, prefix: &str) -> String {
    OBJECT_PREFIX.replace_all(clause, |caps: &Captures| format!("{}{}", &caps[1], prefix)).into_owned()
}

fn is_left_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ':' | '"' | '+' | '-')
}

fn is_right_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, ')' | '"' | '^' | '~')
}

/// Replaces whole-token occurrences of each name in a single left-to-right pass,
/// trying longer names first so a name never matches inside a longer one
fn substitute_names<F>(text: &str, names: &[String], lookup: F) -> String
    where F: Fn(&str) -> String
{
    let mut ordered = names.iter().filter(|n| !n.is_empty()).collect::<Vec<_>>();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut result = String::with_capacity(text.len());
    let mut pos = 0;
    let mut prev: Option<char> = None;

    'outer: while pos < text.len() {
        let rest = &text[pos..];

        if prev.map_or(true, is_left_boundary) {
            for name in &ordered {
                if rest.starts_with(name.as_str())
                    && rest[name.len()..].chars().next().map_or(true, is_right_boundary)
                {
                    result.push_str(lookup(name.as_str()).as_str());
                    pos += name.len();
                    prev = name.chars().last();
                    continue 'outer;
                }
            }
        }

        let c = match rest.chars().next() {
            Some(c) => c,
            None => break,
        };

        result.push(c);
        pos += c.len_utf8();
        prev = Some(c);
    }

    result
}

#[cfg(test)]
mod rewriter_tests {
    use std::collections::HashMap;

    use maplit::hashmap;

    use crate::catalog::Catalog;
    use crate::logging::init_test_logger;
    use crate::query_parser::{extract_objects, parse_query, translate_query, IdentifierMap};
    use crate::query_parser::rewriter::substitute_names;

    fn translations() -> IdentifierMap {
        let to_owned = |m: HashMap<&str, &str>| {
            m.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>()
        };

        hashmap! {
            Catalog::Simbad => to_owned(hashmap! { "X" => "123", "Y" => "456", "Z" => "789" }),
            Catalog::Ned => to_owned(hashmap! { "X" => "XXX", "Y" => "YYY", "Z" => "0" }),
        }
    }

    fn translate(query: &str) -> String {
        let extracted = extract_objects(query).unwrap();

        translate_query(query, &extracted.clauses, &extracted.names, &Catalog::ALL, &translations())
    }

    #[test]
    fn single_clause() {
        init_test_logger();

        assert_eq!(
            "((=abs:(X OR Y) OR simbid:(123 OR 456) OR nedid:(XXX OR YYY)) database:astronomy)",
            translate("object:(X OR Y)")
        );
    }

    #[test]
    fn clauses_inside_other_syntax() {
        init_test_logger();

        assert_eq!(
            "citations(((=abs:(X OR Y) OR simbid:(123 OR 456) OR nedid:(XXX OR YYY)) database:astronomy) OR fulltext:X) -foo:bar ((=abs:Z OR simbid:789 OR nedid:0) database:astronomy)",
            translate("citations(object:(X OR Y) OR fulltext:X) -foo:bar object:Z")
        );
    }

    #[test]
    fn single_target_and_missing_names() {
        init_test_logger();

        let query = "object:(X OR W)";
        let extracted = extract_objects(query).unwrap();
        let rewritten = translate_query(query, &extracted.clauses, &extracted.names, &[Catalog::Simbad], &translations());

        assert_eq!("((=abs:(X OR W) OR simbid:(123 OR 0)) database:astronomy)", rewritten);
    }

    #[test]
    fn repeated_clause_rewritten_twice() {
        init_test_logger();

        assert_eq!(
            "((=abs:X OR simbid:123 OR nedid:XXX) database:astronomy) AND ((=abs:X OR simbid:123 OR nedid:XXX) database:astronomy)",
            translate("object:X AND object:X")
        );
    }

    #[test]
    fn surrounding_text_is_untouched() {
        init_test_logger();

        let query = "bibstem:A&A object:Andromeda year:2015";
        let rewritten = translate(query);

        assert_eq!("bibstem:A&A ((=abs:Andromeda OR simbid:0 OR nedid:0) database:astronomy) year:2015", rewritten);
        assert!(rewritten.starts_with("bibstem:A&A "));
        assert!(rewritten.ends_with(" year:2015"));
    }

    #[test]
    fn unresolved_rewrite_still_parses() {
        init_test_logger();

        for query in ["bibstem:A&A object:Andromeda year:2015", "object:(W OR \"Q 1\") -object:X", "citations(object:Nothing)"] {
            let rewritten = translate(query);

            assert!(rewritten.contains("simbid:"), "{} was not rewritten", query);
            assert!(parse_query(rewritten.as_str()).is_ok(), "{} does not parse", rewritten);
        }
    }

    #[test]
    fn no_object_clauses() {
        init_test_logger();

        let query = "title:X year:2010";
        assert_eq!(query, translate(query));
    }

    #[test]
    fn names_replaced_as_whole_tokens() {
        let names = vec!["M 1".to_string(), "M1".to_string(), "M".to_string()];
        let lookup = |name: &str| match name {
            "M 1" => "a".to_string(),
            "M1" => "b".to_string(),
            _ => "c".to_string(),
        };

        assert_eq!("simbid:(a OR b OR c OR M10)", substitute_names("simbid:(M 1 OR M1 OR M OR M10)", &names, lookup));
        assert_eq!("simbid:\"a\"", substitute_names("simbid:\"M 1\"", &names, lookup));
    }
}
