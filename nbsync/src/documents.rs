//! Desired-state aggregation from directories.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Read every `*.yaml` / `*.yml` file of `dirs` into one document map keyed
/// by file name. Directories are read in order, so a later directory
/// overrides an earlier one on a name clash.
pub async fn load_documents(dirs: &[PathBuf]) -> io::Result<BTreeMap<String, String>> {
    let mut documents = BTreeMap::new();

    for dir in dirs {
        for path in yaml_files(dir).await? {
            let Some(key) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let content = tokio::fs::read_to_string(&path).await?;
            debug!(document = key, dir = %dir.display(), "loaded document");
            documents.insert(key.to_string(), content);
        }
    }

    Ok(documents)
}

async fn yaml_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if is_yaml && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
