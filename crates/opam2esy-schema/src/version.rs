//! Version normalization from opam version strings to `major.minor.patch`.

fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Keep digits, drop leading zeros, and fall back to `0` when nothing is left.
fn normalize_segment(segment: &str) -> String {
    let digits = digits_only(segment);
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Normalize an upstream version to a three-component version.
///
/// A `+suffix` contributes its digits to the minor component when the base has
/// one or two components (`4.02+3` → `4.23.0`). Bases with three or more
/// components are returned as they are, without the suffix.
pub fn normalize_version(raw: &str) -> String {
    let (base, suffix) = match raw.split_once('+') {
        Some((base, suffix)) => (base, digits_only(suffix)),
        None => (raw, String::new()),
    };

    let parts: Vec<&str> = base.splitn(3, '.').collect();
    match parts.as_slice() {
        [major] => format!(
            "{}.{}.0",
            normalize_segment(major),
            normalize_segment(&suffix)
        ),
        [major, minor] => format!("{major}.{}.0", normalize_segment(&format!("{minor}{suffix}"))),
        _ => base.to_owned(),
    }
}

/// Digits found after the last `+` of a package name, or an empty string.
pub fn prerelease_tag(package_name: &str) -> String {
    package_name
        .rsplit_once('+')
        .map(|(_, tail)| digits_only(tail))
        .unwrap_or_default()
}
