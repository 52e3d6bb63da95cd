use super::{
    colorize_status, json_pretty, progress_bar, split_identity, write_atomic,
    EXIT_CONVERSION_ERROR, EXIT_SUCCESS,
};
use opam2esy_core::{Converter, PackageSource};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PackageDir {
    name: String,
    version: String,
    path: PathBuf,
}

#[derive(Debug, Serialize)]
struct PackageReport {
    package: String,
    version: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>, String> {
    let mut dirs = fs::read_dir(dir)
        .map_err(|e| format!("read {}: {e}", dir.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();
    dirs.sort();
    Ok(dirs)
}

/// Every `<name>/<name>.<version>/` directory below `packages_dir`, in sorted order.
fn discover(packages_dir: &Path) -> Result<Vec<PackageDir>, String> {
    let mut found = Vec::new();
    for name_dir in sorted_subdirs(packages_dir)? {
        for version_dir in sorted_subdirs(&name_dir)? {
            let dir_name = version_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let Some((name, version)) = split_identity(&dir_name) else {
                warn!("ignoring {}: not a <name>.<version> directory", version_dir.display());
                continue;
            };
            found.push(PackageDir {
                name: name.to_owned(),
                version: version.to_owned(),
                path: version_dir.clone(),
            });
        }
    }
    Ok(found)
}

fn convert_one(converter: &Converter, package: &PackageDir, out_dir: &Path) -> PackageReport {
    let mut report = PackageReport {
        package: package.name.clone(),
        version: package.version.clone(),
        status: "converted",
        output: None,
        kind: None,
        error: None,
    };

    if converter
        .config()
        .is_package_blacklisted(&package.name, &package.version)
    {
        debug!("skipping blacklisted {}.{}", package.name, package.version);
        report.status = "skipped";
        return report;
    }

    let dest = out_dir
        .join(&package.name)
        .join(&package.version)
        .join("package.json");
    let written = converter
        .convert(
            &package.name,
            &package.version,
            &PackageSource::from_dir(&package.path),
        )
        .map_err(|e| (Some(e.kind()), e.to_string()))
        .and_then(|manifest| {
            manifest
                .to_json_pretty()
                .map_err(|e| (None, format!("JSON serialization failed: {e}")))
        })
        .and_then(|rendered| write_atomic(&dest, &format!("{rendered}\n")).map_err(|e| (None, e)));

    match written {
        Ok(()) => report.output = Some(dest.display().to_string()),
        Err((kind, error)) => {
            warn!("{}.{} failed: {error}", package.name, package.version);
            report.status = "failed";
            report.kind = kind;
            report.error = Some(error);
        }
    }
    report
}

pub fn run(
    converter: &Converter,
    packages_dir: &Path,
    out_dir: &Path,
    json: bool,
) -> Result<u8, String> {
    let packages = discover(packages_dir)?;
    let pb = progress_bar(packages.len() as u64, json);

    let mut reports = Vec::with_capacity(packages.len());
    for package in &packages {
        pb.set_message(format!("{}.{}", package.name, package.version));
        reports.push(convert_one(converter, package, out_dir));
        pb.inc(1);
    }
    pb.finish_and_clear();

    let count = |status: &str| reports.iter().filter(|r| r.status == status).count();
    let (converted, skipped, failed) = (count("converted"), count("skipped"), count("failed"));

    if json {
        let summary = serde_json::json!({
            "converted": converted,
            "skipped": skipped,
            "failed": failed,
            "packages": reports,
        });
        println!("{}", json_pretty(&summary)?);
    } else {
        for report in reports.iter().filter(|r| r.status == "failed") {
            println!(
                "{} {}.{}: {}",
                colorize_status(report.status),
                report.package,
                report.version,
                report.error.as_deref().unwrap_or_default()
            );
        }
        println!(
            "{converted} {}, {skipped} {}, {failed} {}",
            colorize_status("converted"),
            colorize_status("skipped"),
            colorize_status("failed")
        );
    }

    Ok(if failed > 0 {
        EXIT_CONVERSION_ERROR
    } else {
        EXIT_SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opam2esy_core::ConversionConfig;

    fn package(root: &Path, name: &str, version: &str, opam: &str) {
        let dir = root.join(name).join(format!("{name}.{version}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("opam"), opam).unwrap();
    }

    #[test]
    fn discovers_packages_in_sorted_order() {
        let root = tempfile::tempdir().unwrap();
        package(root.path(), "zarith", "1.4", "");
        package(root.path(), "lwt", "2.5.2", "");
        package(root.path(), "lwt", "2.4.8", "");
        fs::create_dir_all(root.path().join("lwt").join("junk")).unwrap();

        let found = discover(root.path()).unwrap();
        let ids: Vec<String> = found
            .iter()
            .map(|p| format!("{}.{}", p.name, p.version))
            .collect();
        assert_eq!(ids, vec!["lwt.2.4.8", "lwt.2.5.2", "zarith.1.4"]);
    }

    #[test]
    fn blacklisted_packages_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        package(root.path(), "lwt", "2.6.0", "");

        let converter = Converter::new(ConversionConfig::builtin());
        let found = discover(root.path()).unwrap();
        let report = convert_one(&converter, &found[0], out.path());
        assert_eq!(report.status, "skipped");
        assert!(!out.path().join("lwt").exists());
    }

    #[test]
    fn failures_are_reported_with_their_kind() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        package(root.path(), "bad", "1.0", "depends: [\"a\" {>= \"1\" | < \"0\"}]\n");

        let converter = Converter::new(ConversionConfig::builtin());
        let found = discover(root.path()).unwrap();
        let report = convert_one(&converter, &found[0], out.path());
        assert_eq!(report.status, "failed");
        assert_eq!(report.kind, Some("unsupported-constraint"));
        assert!(!out.path().join("bad").exists());
    }

    #[test]
    fn converted_manifest_lands_under_name_and_version() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        package(root.path(), "foo", "1.2", "depends: [\"bar\"]\n");

        let converter = Converter::new(ConversionConfig::builtin());
        let found = discover(root.path()).unwrap();
        let report = convert_one(&converter, &found[0], out.path());
        assert_eq!(report.status, "converted");

        let written = out.path().join("foo").join("1.2").join("package.json");
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(written).unwrap()).unwrap();
        assert_eq!(json["name"], "@opam-alpha/foo");
        assert_eq!(json["version"], "1.2.0");
    }
}
