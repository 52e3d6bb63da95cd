//! Translation of opam version constraints into esy (npm-style) ranges.

use crate::version::normalize_version;
use crate::SchemaError;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Range that accepts any version.
pub const ANY_VERSION: &str = "*";

/// Terms that qualify when a dependency is needed rather than which version.
const QUALIFIER_TERMS: &[&str] = &["build", "test"];

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(.*?)""#).expect("valid regex"));
static OCAML_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ocaml-version ([!=<>]+.*?".*?")"#).expect("valid regex"));

/// Replace every `"literal"` in `term` with `f(literal)`.
fn map_quoted(term: &str, f: impl Fn(&str) -> String) -> String {
    QUOTED_RE
        .replace_all(term, |caps: &Captures<'_>| f(&caps[1]))
        .into_owned()
}

fn translate_literal(literal: &str, prerelease_tag: &str) -> String {
    format!("{}{prerelease_tag}", normalize_version(literal))
}

/// Translate an opam constraint such as `{>= "1.2" & < "2.0" & build}`.
///
/// `prerelease_tag` is appended to every translated version; callers derive it
/// from the package being converted with [`crate::prerelease_tag`].
pub fn translate_constraint(expr: &str, prerelease_tag: &str) -> Result<String, SchemaError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Ok(ANY_VERSION.to_owned());
    }

    let inner = expr.trim_matches(|c: char| c == '{' || c == '}');
    if inner.contains('|') {
        return Err(SchemaError::UnsupportedConstraint(expr.to_owned()));
    }

    let terms: Vec<String> = inner
        .split('&')
        .map(str::trim)
        .filter(|t| !t.is_empty() && !QUALIFIER_TERMS.contains(t))
        .map(|t| map_quoted(t, |lit| translate_literal(lit, prerelease_tag)))
        .collect();

    if terms.is_empty() {
        Ok(ANY_VERSION.to_owned())
    } else {
        Ok(terms.join(" "))
    }
}

/// Collect the `ocaml-version <op> "<v>"` terms of an `available` field.
///
/// Returns `None` when the field does not constrain the compiler version.
pub fn translate_available(available: &str, prerelease_tag: &str) -> Option<String> {
    let terms: Vec<&str> = OCAML_VERSION_RE
        .captures_iter(available)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect();

    if terms.is_empty() {
        return None;
    }
    Some(map_quoted(&terms.join(" "), |lit| {
        translate_literal(lit, prerelease_tag)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_constraint_is_any_version() {
        assert_eq!(translate_constraint("", "").unwrap(), "*");
        assert_eq!(translate_constraint("   ", "").unwrap(), "*");
    }

    #[test]
    fn single_comparison() {
        assert_eq!(
            translate_constraint(r#">= "1.2.0""#, "").unwrap(),
            ">= 1.2.0"
        );
        assert_eq!(translate_constraint(r#"{= "1.0"}"#, "").unwrap(), "= 1.0.0");
    }

    #[test]
    fn conjunction_joins_with_space() {
        assert_eq!(
            translate_constraint(r#">= "4.02" & < "4.05""#, "").unwrap(),
            ">= 4.2.0 < 4.5.0"
        );
    }

    #[test]
    fn drops_build_and_test_qualifiers() {
        assert_eq!(translate_constraint("build", "").unwrap(), "*");
        assert_eq!(translate_constraint("{build & test}", "").unwrap(), "*");
        assert_eq!(
            translate_constraint(r#"build & >= "1.1""#, "").unwrap(),
            ">= 1.1.0"
        );
    }

    #[test]
    fn rejects_disjunction() {
        for expr in [r#"< "1.0" | > "2.0""#, "|", r#"{build | test}"#] {
            assert!(matches!(
                translate_constraint(expr, ""),
                Err(SchemaError::UnsupportedConstraint(_))
            ));
        }
    }

    #[test]
    fn appends_prerelease_tag() {
        assert_eq!(
            translate_constraint(r#">= "1.2.3""#, "403").unwrap(),
            ">= 1.2.3403"
        );
    }

    #[test]
    fn available_collects_ocaml_version_terms() {
        let available = r#"[ ocaml-version >= "4.02.0" & ocaml-version < "4.05" ]"#;
        assert_eq!(
            translate_available(available, "").as_deref(),
            Some(">= 4.02.0 < 4.5.0")
        );
    }

    #[test]
    fn available_without_compiler_terms() {
        assert_eq!(translate_available("", ""), None);
        assert_eq!(translate_available(r#"[ os != "windows" ]"#, ""), None);
    }

    #[test]
    fn available_term_does_not_span_lines() {
        assert_eq!(translate_available("[ ocaml-version >=\n \"4.02\" ]", ""), None);
        assert_eq!(
            translate_available("[ ocaml-version != \"4.02.1\" ]", "").as_deref(),
            Some("!= 4.02.1")
        );
    }
}
