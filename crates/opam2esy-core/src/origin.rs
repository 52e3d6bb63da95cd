//! Source archive location read from an opam `url` file.

use crate::ConvertError;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:archive|http|src):\s*"(.*)""#).expect("valid regex"));
static CHECKSUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"checksum:\s*"([a-f0-9]+)""#).expect("valid regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginMetadata {
    pub url: Option<String>,
    pub checksum: Option<String>,
}

/// First capture of `re` in `content`.
fn capture(re: &Regex, content: &str) -> Option<String> {
    re.captures(content).map(|caps| caps[1].to_owned())
}

/// Archive URL (the value runs to the last quote on its line) and hex checksum.
pub fn parse_origin(content: &str) -> OriginMetadata {
    OriginMetadata {
        url: capture(&URL_RE, content),
        checksum: capture(&CHECKSUM_RE, content),
    }
}

/// Read origin metadata; a missing file yields empty metadata rather than an error.
pub fn read_origin(path: &Path) -> Result<OriginMetadata, ConvertError> {
    if !path.is_file() {
        debug!("no origin metadata at {}", path.display());
        return Ok(OriginMetadata::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let origin = parse_origin(&content);
    if origin.url.is_none() || origin.checksum.is_none() {
        warn!(
            "incomplete origin metadata in {} (url: {}, checksum: {})",
            path.display(),
            origin.url.is_some(),
            origin.checksum.is_some()
        );
    }
    Ok(origin)
}
