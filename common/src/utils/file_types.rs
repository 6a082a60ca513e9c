/// Canonical form of a configured extension: no leading dot, lowercase.
/// Returns `None` for blank entries.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let ext = raw.trim().trim_start_matches('.');
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// True when `file_name` ends with `.<ext>` for one of `extensions`, ignoring ASCII case.
///
/// Extensions may be configured with or without the leading dot. A bare `.txt`
/// (hidden file with no stem) does not match.
pub fn has_accepted_extension(file_name: &str, extensions: &[String]) -> bool {
    let Some((stem, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty() {
        return false;
    }
    extensions
        .iter()
        .map(|candidate| candidate.trim_start_matches('.'))
        .any(|candidate| !candidate.is_empty() && candidate.eq_ignore_ascii_case(ext))
}
