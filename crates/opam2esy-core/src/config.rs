//! Conversion configuration: naming, exclusion sets and per-package overrides.
//!
//! The configuration is read once, then shared immutably by every conversion.
//! [`ConversionConfig::builtin`] holds the tables used for the opam-alpha
//! repository; a TOML file can replace them entirely.

use crate::manifest::ExportedEnvVar;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A manual exception to the default conversion rules for one package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Override {
    /// Remove `marker` from the raw version before it is normalized.
    StripVersionMarker { marker: String },
    /// Use these commands verbatim instead of deriving them from the opam file.
    BuildScript { commands: Vec<String> },
    /// Never emit these dependencies.
    ExcludeDependencies { names: BTreeSet<String> },
    /// Extra exported variables; they win over the derived ones.
    ExportedEnv {
        entries: BTreeMap<String, ExportedEnvVar>,
    },
}

impl Override {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StripVersionMarker { .. } => "strip-version-marker",
            Self::BuildScript { .. } => "build-script",
            Self::ExcludeDependencies { .. } => "exclude-dependencies",
            Self::ExportedEnv { .. } => "exported-env",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConversionConfig {
    /// npm scope for generated package names (`@<scope>/<name>`).
    pub scope: String,
    /// GitHub organization hosting the helper packages every build needs.
    pub github_org: String,
    /// Dependencies with this prefix are opam virtual packages and are skipped.
    pub virtual_prefix: String,
    /// Compiler range used when `available` does not constrain `ocaml-version`.
    pub default_ocaml_range: String,
    /// Dependencies dropped from every package.
    pub excluded_dependencies: BTreeSet<String>,
    /// Optional dependencies dropped from every package.
    pub depopt_blacklist: BTreeSet<String>,
    /// `name.version` identities the driver never converts.
    pub package_blacklist: BTreeSet<String>,
    /// Dependencies added verbatim to a package, keyed by package name.
    pub extra_dependencies: BTreeMap<String, BTreeMap<String, String>>,
    pub overrides: BTreeMap<String, Vec<Override>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            scope: "opam-alpha".to_owned(),
            github_org: "esy-ocaml".to_owned(),
            virtual_prefix: "base-".to_owned(),
            default_ocaml_range: ">= 4.2.3".to_owned(),
            excluded_dependencies: BTreeSet::from(["ocamlbuild".to_owned()]),
            depopt_blacklist: BTreeSet::new(),
            package_blacklist: BTreeSet::new(),
            extra_dependencies: BTreeMap::new(),
            overrides: BTreeMap::new(),
        }
    }
}

/// On-disk form of [`ConversionConfig`]; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    scope: Option<String>,
    github_org: Option<String>,
    virtual_prefix: Option<String>,
    default_ocaml_range: Option<String>,
    excluded_dependencies: Option<BTreeSet<String>>,
    depopt_blacklist: Option<BTreeSet<String>>,
    package_blacklist: Option<BTreeSet<String>>,
    extra_dependencies: Option<BTreeMap<String, BTreeMap<String, String>>>,
    overrides: Option<BTreeMap<String, Vec<Override>>>,
}

impl ConversionConfig {
    /// Parse a TOML config. Each key present replaces the built-in value
    /// as a whole; absent keys keep the built-in tables, built for the
    /// file's `scope`.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(input)?;
        let mut config = match &file.scope {
            Some(scope) => Self::builtin_for_scope(scope),
            None => Self::builtin(),
        };
        if let Some(v) = file.github_org {
            config.github_org = v;
        }
        if let Some(v) = file.virtual_prefix {
            config.virtual_prefix = v;
        }
        if let Some(v) = file.default_ocaml_range {
            config.default_ocaml_range = v;
        }
        if let Some(v) = file.excluded_dependencies {
            config.excluded_dependencies = v;
        }
        if let Some(v) = file.depopt_blacklist {
            config.depopt_blacklist = v;
        }
        if let Some(v) = file.package_blacklist {
            config.package_blacklist = v;
        }
        if let Some(v) = file.extra_dependencies {
            config.extra_dependencies = v;
        }
        if let Some(v) = file.overrides {
            config.overrides = v;
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn overrides_for(&self, package: &str) -> &[Override] {
        self.overrides.get(package).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Apply every `strip-version-marker` override of `package` to `version`.
    pub fn transform_version(&self, package: &str, version: &str) -> String {
        self.overrides_for(package)
            .iter()
            .fold(version.to_owned(), |acc, o| match o {
                Override::StripVersionMarker { marker } => acc.replace(marker.as_str(), ""),
                _ => acc,
            })
    }

    pub fn build_script(&self, package: &str) -> Option<&[String]> {
        self.overrides_for(package).iter().find_map(|o| match o {
            Override::BuildScript { commands } => Some(commands.as_slice()),
            _ => None,
        })
    }

    pub fn is_dependency_allowed(&self, package: &str, dependency: &str) -> bool {
        if self.excluded_dependencies.contains(dependency) {
            return false;
        }
        !self.overrides_for(package).iter().any(|o| {
            matches!(o, Override::ExcludeDependencies { names } if names.contains(dependency))
        })
    }

    pub fn exported_env_overrides(
        &self,
        package: &str,
    ) -> impl Iterator<Item = (&String, &ExportedEnvVar)> {
        self.overrides_for(package)
            .iter()
            .filter_map(|o| match o {
                Override::ExportedEnv { entries } => Some(entries),
                _ => None,
            })
            .flatten()
    }

    pub fn extra_dependencies_for(&self, package: &str) -> impl Iterator<Item = (&String, &String)> {
        self.extra_dependencies.get(package).into_iter().flatten()
    }

    pub fn is_package_blacklisted(&self, package: &str, version: &str) -> bool {
        self.package_blacklist
            .contains(&format!("{package}.{version}"))
    }

    /// The production tables for converting the opam repository into `@opam-alpha`.
    pub fn builtin() -> Self {
        Self::builtin_for_scope(&Self::default().scope)
    }

    /// The production tables with scoped names and library paths under `scope`.
    pub fn builtin_for_scope(scope: &str) -> Self {
        let mut config = Self {
            scope: scope.to_owned(),
            package_blacklist: [
                "camlp4.4.03+system",
                "camlp4.4.02+system",
                "camlp4.4.04+system",
                "inotify.2.2",
                "inotify.2.3",
                "ocaml-data-notation.0.0.9",
                "lwt.2.6.0",
                "ppx_tools.5.0+4.03.0",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            depopt_blacklist: [
                "conf-libev",
                "lablgtk",
                "ssl",
                "mirage-xen",
                "mirage-xen-ocaml",
                "tyxml",
                "reactiveData",
                "deriving",
                "ocamlbuild",
                "js_of_ocaml",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            ..Self::default()
        };

        let scoped = |name: &str| format!("@{}/{name}", config.scope);
        let camomile = BTreeMap::from([
            (scoped("cppo"), "*".to_owned()),
            (scoped("camlp4"), "*".to_owned()),
        ]);
        config
            .extra_dependencies
            .insert("camomile".to_owned(), camomile);
        config.extra_dependencies.insert(
            "conf-pkg-config".to_owned(),
            BTreeMap::from([(
                "yarn-pkg-config".to_owned(),
                "reasonml/yarn-pkg-config#esy".to_owned(),
            )]),
        );

        let drop_beta = || Override::StripVersionMarker {
            marker: "-beta".to_owned(),
        };
        let build = |commands: &[&str]| Override::BuildScript {
            commands: commands.iter().map(|c| (*c).to_owned()).collect(),
        };
        let exclude = |names: &[&str]| Override::ExcludeDependencies {
            names: names.iter().map(|n| (*n).to_owned()).collect(),
        };
        let ld_path = |package: &str, stublibs: bool| Override::ExportedEnv {
            entries: BTreeMap::from([(
                "CAML_LD_LIBRARY_PATH".to_owned(),
                caml_ld_library_path(&config.scope, package, stublibs),
            )]),
        };

        let mut overrides: Vec<(&str, Vec<Override>)> = vec![
            ("ocp-build", vec![drop_beta()]),
            (
                "conf-gmp",
                vec![build(&["cc -c $CFLAGS -I/usr/local/include test.c"])],
            ),
            (
                "typerex-build",
                vec![
                    drop_beta(),
                    build(&[
                        "./configure --prefix $cur__install",
                        "make",
                        "make install",
                        INSTALLER_COMMAND,
                    ]),
                ],
            ),
            ("ocamlbuild", vec![build(&["true"])]),
            (
                "cppo",
                vec![build(&[
                    "(make clean || true)",
                    "make all",
                    "make opt",
                    "make ocamlbuild",
                    "make LIBDIR=$cur__lib install-lib",
                    "make BINDIR=$cur__bin install-bin",
                    INSTALLER_COMMAND,
                ])],
            ),
            ("cohttp", vec![exclude(&["mirage-net"])]),
            ("conduit", vec![exclude(&["mirage-dns"])]),
            ("ocamlgraph", vec![exclude(&["conf-gnomecanvas"])]),
            ("utop", vec![exclude(&["camlp4"])]),
            (
                "vchan",
                vec![exclude(&["xen-evtchn", "xen-gnt"]), ld_path("vchan", false)],
            ),
            (
                "nocrypto",
                vec![
                    exclude(&["mirage-xen", "mirage-entropy-xen", "zarith-xen"]),
                    ld_path("nocrypto", false),
                ],
            ),
            (
                "mtime",
                vec![exclude(&["js_of_ocaml"]), ld_path("mtime", true)],
            ),
        ];
        for package in [
            "ctypes",
            "zarith",
            "cstruct",
            "launchd",
            "lwt",
            "lambda-term",
            "inotify",
            "io-page",
            "pcre",
        ] {
            overrides.push((package, vec![ld_path(package, false)]));
        }
        for package in [
            "bin_prot",
            "core_kernel",
            "core",
            "async_extra",
            "async_ssl",
            "jenga",
            "re2",
            "ppx_expect",
            "ocaml_plugin",
            "async_unix",
        ] {
            overrides.push((package, vec![ld_path(package, true)]));
        }

        config.overrides = overrides
            .into_iter()
            .map(|(name, rules)| (name.to_owned(), rules))
            .collect();
        config
    }
}

/// Final command of every derived build script.
pub const INSTALLER_COMMAND: &str = "(opam-installer --prefix=$cur__install || true)";

/// `CAML_LD_LIBRARY_PATH` entry pointing at a package's stub libraries.
pub fn caml_ld_library_path(scope: &str, package: &str, stublibs: bool) -> ExportedEnvVar {
    let scope_stem = scope.replace('-', "_");
    let package_stem = package.replace('-', "_");
    let dir = if stublibs { "stublibs" } else { package };
    ExportedEnvVar::global(format!(
        "${scope_stem}_{package_stem}__lib/{dir}:$CAML_LD_LIBRARY_PATH"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_excludes_ocamlbuild_everywhere() {
        let config = ConversionConfig::default();
        assert!(!config.is_dependency_allowed("anything", "ocamlbuild"));
        assert!(config.is_dependency_allowed("anything", "lwt"));
    }

    #[test]
    fn override_exclusions_apply_to_their_package_only() {
        let config = ConversionConfig::builtin();
        assert!(!config.is_dependency_allowed("vchan", "xen-gnt"));
        assert!(config.is_dependency_allowed("cohttp", "xen-gnt"));
        assert!(!config.is_dependency_allowed("cohttp", "mirage-net"));
    }

    #[test]
    fn version_marker_is_stripped() {
        let config = ConversionConfig::builtin();
        assert_eq!(config.transform_version("ocp-build", "1.99.17-beta"), "1.99.17");
        assert_eq!(config.transform_version("lwt", "2.5.2-beta"), "2.5.2-beta");
    }

    #[test]
    fn builtin_build_scripts() {
        let config = ConversionConfig::builtin();
        assert_eq!(config.build_script("ocamlbuild"), Some(&["true".to_owned()][..]));
        let cppo = config.build_script("cppo").unwrap();
        assert_eq!(cppo.last().map(String::as_str), Some(INSTALLER_COMMAND));
        assert!(config.build_script("lwt").is_none());
    }

    #[test]
    fn caml_ld_library_path_values() {
        assert_eq!(
            caml_ld_library_path("opam-alpha", "lambda-term", false).val,
            "$opam_alpha_lambda_term__lib/lambda-term:$CAML_LD_LIBRARY_PATH"
        );
        assert_eq!(
            caml_ld_library_path("opam-alpha", "core", true).val,
            "$opam_alpha_core__lib/stublibs:$CAML_LD_LIBRARY_PATH"
        );
    }

    #[test]
    fn builtin_blacklists() {
        let config = ConversionConfig::builtin();
        assert!(config.is_package_blacklisted("lwt", "2.6.0"));
        assert!(!config.is_package_blacklisted("lwt", "2.5.2"));
        assert!(config.depopt_blacklist.contains("ssl"));
        let extras: Vec<_> = config.extra_dependencies_for("camomile").collect();
        assert_eq!(extras.len(), 2);
    }

    #[test]
    fn parses_toml_config() {
        let input = r#"
scope = "my-scope"
depopt_blacklist = ["ssl"]

[extra_dependencies.camomile]
"@my-scope/cppo" = "*"

[[overrides.cppo]]
kind = "build-script"
commands = ["make", "(opam-installer --prefix=$cur__install || true)"]

[[overrides.vchan]]
kind = "exclude-dependencies"
names = ["xen-evtchn"]

[[overrides.vchan]]
kind = "exported-env"
entries = { CAML_LD_LIBRARY_PATH = { val = "x" } }
"#;
        let config = ConversionConfig::from_toml_str(input).unwrap();
        assert_eq!(config.scope, "my-scope");
        assert_eq!(config.github_org, "esy-ocaml");
        assert_eq!(config.build_script("cppo").unwrap().len(), 2);
        assert!(!config.is_dependency_allowed("vchan", "xen-evtchn"));
        let env: Vec<_> = config.exported_env_overrides("vchan").collect();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].1.scope, "global");
    }

    #[test]
    fn absent_keys_keep_builtin_tables_under_the_file_scope() {
        let config = ConversionConfig::from_toml_str("scope = \"alt\"\n").unwrap();
        assert_eq!(config.scope, "alt");
        assert_eq!(config.build_script("ocamlbuild"), Some(&["true".to_owned()][..]));
        assert!(config.build_script("cppo").is_some());
        assert!(config.depopt_blacklist.contains("ssl"));
        assert!(config.is_package_blacklisted("lwt", "2.6.0"));
        let env: Vec<_> = config.exported_env_overrides("lwt").collect();
        assert_eq!(
            env[0].1.val,
            "$alt_lwt__lib/lwt:$CAML_LD_LIBRARY_PATH"
        );
        let camomile: Vec<_> = config.extra_dependencies_for("camomile").collect();
        assert_eq!(camomile[0].0, "@alt/camlp4");
    }

    #[test]
    fn present_keys_replace_builtin_tables() {
        let config =
            ConversionConfig::from_toml_str("depopt_blacklist = []\n[overrides]\n").unwrap();
        assert_eq!(config.scope, "opam-alpha");
        assert!(config.depopt_blacklist.is_empty());
        assert!(config.overrides.is_empty());
        assert!(config.is_package_blacklisted("lwt", "2.6.0"));
    }

    #[test]
    fn empty_file_is_the_builtin_config() {
        assert_eq!(
            ConversionConfig::from_toml_str("").unwrap(),
            ConversionConfig::builtin()
        );
    }

    #[test]
    fn rejects_unknown_key() {
        assert!(ConversionConfig::from_toml_str("unknown_key = 1\n").is_err());
    }

    #[test]
    fn rejects_unknown_override_kind() {
        let input = "[[overrides.x]]\nkind = \"rename\"\n";
        assert!(ConversionConfig::from_toml_str(input).is_err());
    }

    #[test]
    fn loads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opam2esy.toml");
        fs::write(&path, "scope = \"alt\"\n").unwrap();
        let config = ConversionConfig::load(&path).unwrap();
        assert_eq!(config.scope, "alt");
        assert!(ConversionConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
