use crate::manifest::AuxFile;
use crate::ConvertError;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Read every regular file of an opam `files/` directory, sorted by name.
///
/// A missing directory yields no files. A file containing a NUL byte is
/// treated as binary and aborts the conversion, as does non-UTF-8 content.
pub fn collect_aux_files(dir: &Path) -> Result<Vec<AuxFile>, ConvertError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let io_err = |source| ConvertError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir)
        .map_err(io_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    entries.sort_by_key(fs::DirEntry::file_name);

    let mut files = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        if !path.is_file() {
            warn!("skipping non-file entry {}", path.display());
            continue;
        }
        let bytes = fs::read(&path).map_err(|source| ConvertError::Io {
            path: path.clone(),
            source,
        })?;
        if bytes.contains(&0) {
            return Err(ConvertError::BinaryAuxiliaryFile(path));
        }
        let content =
            String::from_utf8(bytes).map_err(|_| ConvertError::InvalidAuxiliaryFile(path.clone()))?;
        debug!("embedding {} ({} bytes)", path.display(), content.len());
        files.push(AuxFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            content,
        });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_has_no_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_aux_files(&dir.path().join("files")).unwrap().is_empty());
    }

    #[test]
    fn files_are_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.patch"), "b").unwrap();
        fs::write(dir.path().join("a.install"), "a").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let files = collect_aux_files(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.install", "b.patch"]);
        assert_eq!(files[0].content, "a");
    }

    #[test]
    fn nul_byte_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blob.bin"), b"ab\0cd").unwrap();
        assert!(matches!(
            collect_aux_files(dir.path()),
            Err(ConvertError::BinaryAuxiliaryFile(_))
        ));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("latin1.txt"), [0xe9, 0x74, 0xe9]).unwrap();
        assert!(matches!(
            collect_aux_files(dir.path()),
            Err(ConvertError::InvalidAuxiliaryFile(_))
        ));
    }
}
