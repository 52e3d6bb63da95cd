//! Expansion of opam `%{var}%` placeholders in build commands.

use crate::SchemaError;
use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\{(.*?)\}%").expect("valid regex"));
static ENABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*):enable").expect("valid regex"));
static INSTALLED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*):installed").expect("valid regex"));

/// Built-in variables available to every build command of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinVars {
    package: String,
}

impl BuiltinVars {
    pub fn for_package(name: impl Into<String>) -> Self {
        Self {
            package: name.into(),
        }
    }

    pub fn get(&self, var: &str) -> Option<&str> {
        let value = match var {
            "name" => return Some(&self.package),
            "make" => "make",
            "jobs" => "4",
            "bin" => "$cur__bin",
            "prefix" => "$cur__install",
            "lib" => "$cur__lib",
            "sbin" => "$cur__sbin",
            "doc" => "$cur__doc",
            "man" => "$cur__man",
            "ocaml-native" | "ocaml-native-dynlink" => "true",
            "pinned" => "false",
            _ => return None,
        };
        Some(value)
    }

    /// Resolve a bare command word; unknown words are returned unchanged.
    pub fn resolve_word<'a>(&'a self, word: &'a str) -> &'a str {
        self.get(word).unwrap_or(word)
    }

    fn expand(&self, var: &str) -> Result<String, SchemaError> {
        if let Some(value) = self.get(var) {
            return Ok(value.to_owned());
        }
        if let Some(caps) = ENABLE_RE.captures(var) {
            return Ok(format!("${{{}_enable:-disable}}", env_var_stem(&caps[1])));
        }
        if let Some(caps) = INSTALLED_RE.captures(var) {
            return Ok(format!("${{{}_installed:-false}}", env_var_stem(&caps[1])));
        }
        Err(SchemaError::UnknownVariable(var.to_owned()))
    }
}

/// Shell-safe stem for per-package variables: `lwt+ssl` → `lwt`, `lambda-term` → `lambda_term`.
fn env_var_stem(pkg: &str) -> String {
    let base = pkg.split_once('+').map_or(pkg, |(base, _)| base);
    base.replace('-', "_")
}

/// Replace every `%{var}%` in `input`.
///
/// Fails with [`SchemaError::UnknownVariable`] on the first placeholder that is
/// neither a built-in nor a `<pkg>:enable` / `<pkg>:installed` query. An
/// unterminated `%{` is copied through.
pub fn expand_variables(input: &str, vars: &BuiltinVars) -> Result<String, SchemaError> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&input[last..whole.start()]);
        out.push_str(&vars.expand(&caps[1])?);
        last = whole.end();
    }
    out.push_str(&input[last..]);
    Ok(out)
}
