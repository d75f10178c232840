use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use tempfile::TempDir;

use kira_id_mapper::error::MapperError;
use kira_id_mapper::input::{collect_identifiers, read_identifiers};

#[test]
fn merges_inline_and_file_identifiers() {
    let dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("ids.txt")).unwrap();
    fs::write(&path, "# symbols\nTP53\nMYC\n\nTP53\n").unwrap();

    let ids = collect_identifiers(&["CDK6".to_string(), " ".to_string()], Some(path.as_path())).unwrap();
    let ids: Vec<_> = ids.into_iter().collect();
    assert_eq!(ids, vec!["CDK6", "MYC", "TP53"]);
}

#[test]
fn unreadable_file_names_the_path() {
    let dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("missing.txt")).unwrap();
    let result = read_identifiers(&path);
    assert_matches!(result, Err(MapperError::InputRead { path: reported, .. }) if reported == path);
}
