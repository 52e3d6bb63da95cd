pub mod completions;
pub mod convert;
pub mod convert_repo;
pub mod overrides;

use indicatif::{ProgressBar, ProgressStyle};
use opam2esy_core::ConvertError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONVERSION_ERROR: u8 = 2;
pub const EXIT_CONFIG_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn conversion_error(e: &ConvertError) -> String {
    format!("conversion error: {e}")
}

/// Split an opam-repository directory name `<name>.<version>` at its first dot.
pub fn split_identity(dir_name: &str) -> Option<(&str, &str)> {
    dir_name
        .split_once('.')
        .filter(|(name, version)| !name.is_empty() && !version.is_empty())
}

/// Name and version for a package directory, explicit values winning over the directory name.
pub fn package_identity(
    dir: &Path,
    name: Option<&str>,
    version: Option<&str>,
) -> Result<(String, String), String> {
    let dir_name = dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();
    let derived = split_identity(&dir_name);
    let name = name
        .map(str::to_owned)
        .or_else(|| derived.map(|(n, _)| n.to_owned()))
        .ok_or_else(|| {
            format!(
                "cannot infer package name from '{}' (pass --name)",
                dir.display()
            )
        })?;
    let version = version
        .map(str::to_owned)
        .or_else(|| derived.map(|(_, v)| v.to_owned()))
        .ok_or_else(|| {
            format!(
                "cannot infer package version from '{}' (pass --package-version)",
                dir.display()
            )
        })?;
    Ok((name, version))
}

/// Write `content` to `dest` through a synced temp file in the same directory.
pub fn write_atomic(dest: &Path, content: &str) -> Result<(), String> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    std::fs::create_dir_all(&dir).map_err(|e| format!("create {}: {e}", dir.display()))?;
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| format!("write temp file: {e}"))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| format!("write temp file: {e}"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("fsync temp file: {e}"))?;
    tmp.persist(dest)
        .map_err(|e| format!("persist {}: {}", dest.display(), e.error))?;
    Ok(())
}

pub fn progress_bar(len: u64, json: bool) -> ProgressBar {
    if json {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {msg}")
            .expect("valid template")
            .progress_chars("=> "),
    );
    pb
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "converted" => Style::new().green().apply_to(status).to_string(),
        "skipped" => Style::new().dim().apply_to(status).to_string(),
        "failed" => Style::new().red().bold().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn split_identity_at_first_dot() {
        assert_eq!(split_identity("lwt.2.5.2"), Some(("lwt", "2.5.2")));
        assert_eq!(split_identity("ocaml-base-compiler.4.02.3"), Some(("ocaml-base-compiler", "4.02.3")));
        assert_eq!(split_identity("noversion"), None);
        assert_eq!(split_identity(".hidden"), None);
        assert_eq!(split_identity("trailing."), None);
    }

    #[test]
    fn package_identity_prefers_explicit_values() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("lwt.2.5.2");
        std::fs::create_dir(&pkg).unwrap();

        assert_eq!(
            package_identity(&pkg, None, None).unwrap(),
            ("lwt".to_owned(), "2.5.2".to_owned())
        );
        assert_eq!(
            package_identity(&pkg, Some("lwt-ssl"), Some("1.0")).unwrap(),
            ("lwt-ssl".to_owned(), "1.0".to_owned())
        );
    }

    #[test]
    fn package_identity_requires_a_name() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("plain");
        std::fs::create_dir(&pkg).unwrap();
        let err = package_identity(&pkg, None, Some("1.0")).unwrap_err();
        assert!(err.contains("--name"));
    }

    #[test]
    fn write_atomic_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("lwt").join("2.5.2").join("package.json");
        write_atomic(&dest, "{}\n").unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "{}\n");
    }

    #[test]
    fn colorize_status_keeps_text() {
        assert!(colorize_status("converted").contains("converted"));
        assert!(colorize_status("failed").contains("failed"));
        assert_eq!(colorize_status("other"), "other");
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_CONVERSION_ERROR);
        assert_ne!(EXIT_CONVERSION_ERROR, EXIT_CONFIG_ERROR);
    }
}
