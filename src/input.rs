use std::collections::BTreeSet;
use std::fs;

use camino::Utf8Path;

use crate::error::MapperError;

/// One identifier per line. Blank lines and `#` comments are skipped; duplicates collapse.
pub fn parse_identifiers(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_identifiers(path: &Utf8Path) -> Result<BTreeSet<String>, MapperError> {
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| MapperError::InputRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(parse_identifiers(&content))
}

/// Union of identifiers given inline and those listed in `file`.
pub fn collect_identifiers(
    inline: &[String],
    file: Option<&Utf8Path>,
) -> Result<BTreeSet<String>, MapperError> {
    let mut ids: BTreeSet<String> = inline
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if let Some(path) = file {
        ids.extend(read_identifiers(path)?);
    }
    Ok(ids)
}
