use opam2esy_schema::ScopedName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scope esy uses for variables visible to every dependent package.
pub const GLOBAL_SCOPE: &str = "global";

/// An esy `package.json` generated from one opam package.
///
/// Field order matches the emitted JSON. Maps are `BTreeMap`s so the output
/// is byte-identical across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: ScopedName,
    pub version: String,
    pub scripts: BTreeMap<String, String>,
    pub peer_dependencies: BTreeMap<String, String>,
    pub esy: EsySection,
    pub dependencies: BTreeMap<String, String>,
    pub opam: OpamOrigin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EsySection {
    pub build: Vec<String>,
    pub builds_in_source: bool,
    pub exported_env: BTreeMap<String, ExportedEnvVar>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportedEnvVar {
    pub val: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

impl ExportedEnvVar {
    pub fn global(val: impl Into<String>) -> Self {
        Self {
            val: val.into(),
            scope: default_scope(),
        }
    }
}

fn default_scope() -> String {
    GLOBAL_SCOPE.to_owned()
}

/// Where the sources come from, plus the opam `files/` embedded verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpamOrigin {
    pub url: Option<String>,
    pub checksum: Option<String>,
    pub files: Vec<AuxFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuxFile {
    pub name: String,
    pub content: String,
}

impl Manifest {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        let mut exported_env = BTreeMap::new();
        exported_env.insert("foo_version".to_owned(), ExportedEnvVar::global("1.0.0"));
        Manifest {
            name: ScopedName::new("@opam-alpha/foo"),
            version: "1.0.0".to_owned(),
            scripts: BTreeMap::new(),
            peer_dependencies: BTreeMap::from([("ocaml".to_owned(), ">= 4.2.3".to_owned())]),
            esy: EsySection {
                build: vec!["make".to_owned()],
                builds_in_source: true,
                exported_env,
            },
            dependencies: BTreeMap::new(),
            opam: OpamOrigin::default(),
        }
    }

    #[test]
    fn serializes_with_esy_key_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["peerDependencies"]["ocaml"], ">= 4.2.3");
        assert_eq!(value["esy"]["buildsInSource"], true);
        assert_eq!(value["esy"]["exportedEnv"]["foo_version"]["scope"], "global");
        assert!(value["opam"]["url"].is_null());
        assert!(value["scripts"].as_object().unwrap().is_empty());
    }

    #[test]
    fn top_level_key_order_is_fixed() {
        let json = sample().to_json_pretty().unwrap();
        let positions: Vec<usize> = [
            "\"name\"",
            "\"version\"",
            "\"scripts\"",
            "\"peerDependencies\"",
            "\"esy\"",
            "\"dependencies\"",
            "\"opam\"",
        ]
        .iter()
        .map(|key| json.find(key).unwrap())
        .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn exported_env_scope_defaults_to_global() {
        let var: ExportedEnvVar = serde_json::from_str(r#"{"val": "x"}"#).unwrap();
        assert_eq!(var, ExportedEnvVar::global("x"));
    }
}
