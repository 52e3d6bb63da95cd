use crate::config::{ConversionConfig, INSTALLER_COMMAND};
use crate::files::collect_aux_files;
use crate::manifest::{EsySection, ExportedEnvVar, Manifest, OpamOrigin};
use crate::origin::read_origin;
use crate::ConvertError;
use opam2esy_schema::{
    command_words, expand_variables, normalize_version, parse_command_list, parse_document,
    parse_flat_list, prerelease_tag, translate_available, translate_constraint, BuiltinVars,
    CommandWord, OpamDocument, PackageName,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Filters that remove a command from the derived build script.
const DROPPED_FILTERS: &[&str] = &["!ocaml-native", "preinstalled"];

/// Input files of one opam package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSource {
    pub opam_file: PathBuf,
    pub url_file: PathBuf,
    pub files_dir: PathBuf,
}

impl PackageSource {
    /// Standard opam-repository layout: `opam`, `url` and `files/` side by side.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            opam_file: dir.join("opam"),
            url_file: dir.join("url"),
            files_dir: dir.join("files"),
        }
    }
}

/// Converts opam packages into esy manifests under one fixed configuration.
///
/// The converter holds no mutable state; a single instance can convert any
/// number of packages, from any number of threads.
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConversionConfig,
}

impl Converter {
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Read a package's files and convert it.
    ///
    /// All inputs are read before any transformation, so a failure never
    /// leaves a partially built manifest behind.
    pub fn convert(
        &self,
        name: &str,
        version: &str,
        source: &PackageSource,
    ) -> Result<Manifest, ConvertError> {
        info!("converting {name}.{version}");

        if !source.opam_file.is_file() {
            return Err(ConvertError::MissingOpamFile(source.opam_file.clone()));
        }
        let opam_text =
            std::fs::read_to_string(&source.opam_file).map_err(|e| ConvertError::Io {
                path: source.opam_file.clone(),
                source: e,
            })?;
        let metadata = read_origin(&source.url_file)?;
        let files = collect_aux_files(&source.files_dir)?;

        let origin = OpamOrigin {
            url: metadata.url,
            checksum: metadata.checksum,
            files,
        };
        self.convert_document(name, version, &opam_text, origin)
    }

    /// Convert already-read opam text. Pure: no filesystem access.
    pub fn convert_document(
        &self,
        name: &str,
        version: &str,
        opam_text: &str,
        origin: OpamOrigin,
    ) -> Result<Manifest, ConvertError> {
        let package = PackageName::new(name);
        let doc = parse_document(opam_text).map_err(ConvertError::field("opam"))?;
        let tag = prerelease_tag(name);
        let vars = BuiltinVars::for_package(name);

        let version = normalize_version(&self.config.transform_version(name, version));
        debug!("{name}: normalized version {version}");

        let build = match self.config.build_script(name) {
            Some(commands) => {
                debug!("{name}: using build script override");
                commands.to_vec()
            }
            None => self.derive_build_script(&doc, &vars)?,
        };

        let mut dependencies = BTreeMap::from([
            (
                "substs".to_owned(),
                format!("{}/substs", self.config.github_org),
            ),
            (
                "opam-installer-bin".to_owned(),
                format!("{}/opam-installer-bin", self.config.github_org),
            ),
        ]);
        self.add_dependencies(&package, &doc, "depends", &tag, &mut dependencies)?;
        for (dep, range) in self.config.extra_dependencies_for(name) {
            dependencies.insert(dep.clone(), range.clone());
        }
        self.add_dependencies(&package, &doc, "depopts", &tag, &mut dependencies)?;

        let ocaml_range = translate_available(doc.get_or_empty("available"), &tag)
            .unwrap_or_else(|| self.config.default_ocaml_range.clone());

        let stem = package.env_stem();
        let mut exported_env = BTreeMap::from([
            (format!("{stem}_version"), ExportedEnvVar::global(&version)),
            (format!("{stem}_enable"), ExportedEnvVar::global("enable")),
            (format!("{stem}_installed"), ExportedEnvVar::global("true")),
        ]);
        for (key, var) in self.config.exported_env_overrides(name) {
            exported_env.insert(key.clone(), var.clone());
        }

        Ok(Manifest {
            name: package.scoped(&self.config.scope),
            version,
            scripts: BTreeMap::new(),
            peer_dependencies: BTreeMap::from([("ocaml".to_owned(), ocaml_range)]),
            esy: EsySection {
                build,
                builds_in_source: true,
                exported_env,
            },
            dependencies,
            opam: origin,
        })
    }

    /// `substs` invocations, then the filtered `build` and `install` commands,
    /// then the installer, all with placeholders expanded.
    fn derive_build_script(
        &self,
        doc: &OpamDocument,
        vars: &BuiltinVars,
    ) -> Result<Vec<String>, ConvertError> {
        let substs =
            parse_flat_list(doc.get_or_empty("substs")).map_err(ConvertError::field("substs"))?;
        let mut script: Vec<String> = substs
            .iter()
            .map(|entry| format!("substs {}.in", entry.token))
            .collect();

        for field in ["build", "install"] {
            let commands =
                parse_command_list(doc.get_or_empty(field)).map_err(ConvertError::field(field))?;
            for command in commands {
                if DROPPED_FILTERS.contains(&command.qualifier.as_str()) {
                    debug!("dropping {field} command '{}' ({})", command.token, command.qualifier);
                    continue;
                }
                let words = command_words(&command.token).map_err(ConvertError::field(field))?;
                let line = words
                    .iter()
                    .map(|word| match word {
                        CommandWord::Quoted(text) => text.as_str(),
                        CommandWord::Bare(text) => vars.resolve_word(text),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                script.push(line);
            }
        }
        script.push(INSTALLER_COMMAND.to_owned());

        script
            .iter()
            .map(|command| expand_variables(command, vars))
            .collect::<Result<Vec<_>, _>>()
            .map_err(ConvertError::field("build"))
    }

    fn add_dependencies(
        &self,
        package: &PackageName,
        doc: &OpamDocument,
        field: &str,
        tag: &str,
        dependencies: &mut BTreeMap<String, String>,
    ) -> Result<(), ConvertError> {
        let optional = field == "depopts";
        let entries =
            parse_flat_list(doc.get_or_empty(field)).map_err(ConvertError::field(field))?;

        for entry in entries {
            let dep = entry.token.trim();
            if dep.is_empty() || dep.starts_with(&self.config.virtual_prefix) {
                continue;
            }
            if !self.config.is_dependency_allowed(package, dep)
                || (optional && self.config.depopt_blacklist.contains(dep))
            {
                debug!("{package}: excluding {field} entry {dep}");
                continue;
            }
            let range =
                translate_constraint(&entry.qualifier, tag).map_err(ConvertError::field(field))?;
            dependencies.insert(
                PackageName::new(dep).scoped(&self.config.scope).into_inner(),
                range,
            );
        }
        Ok(())
    }
}
