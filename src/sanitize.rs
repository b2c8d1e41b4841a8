use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern should compile"));

const FORBIDDEN: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Makes `name` usable as a single path component: drops characters that
/// are invalid on common filesystems and turns whitespace runs into `_`.
pub fn sanitize_filename(name: &str) -> String {
    let stripped = name.replace(FORBIDDEN, "");
    WHITESPACE.replace_all(&stripped, "_").into_owned()
}

/// Directory name for a whole title: invalid characters and each single
/// space become `_`, so names stay as long as the title they came from.
pub fn sanitize_dir_name(name: &str) -> String {
    name.replace(FORBIDDEN, "_").replace(' ', "_")
}
