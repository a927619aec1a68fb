use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use readmevec_core::{Item, ReadmeFileName};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::EmbedResult;

/// Concurrent file reads are capped by this semaphore so loading a chunk of
/// tens of thousands of READMEs never opens more than this many file
/// descriptors at once.
pub const DEFAULT_FILE_READERS: usize = 16;

/// Reads a chunk of README files off disk, parses each filename back to
/// `owner/repo`, hashes and trims content, and drops anything already
/// embedded or duplicated within the chunk.
///
/// Bounded-memory by construction: callers are expected to pass one chunk
/// at a time and discard the result after the chunk is embedded, never the
/// whole corpus at once.
pub struct ItemLoader {
    file_readers: usize,
}

impl ItemLoader {
    #[must_use]
    pub fn new(file_readers: usize) -> Self {
        Self {
            file_readers: file_readers.max(1),
        }
    }
}

impl Default for ItemLoader {
    fn default() -> Self {
        Self::new(DEFAULT_FILE_READERS)
    }
}

impl ItemLoader {
    /// Loads `paths`, skipping IDs already in `existing_ids`. Returns a
    /// deduplicated, ordered list of items.
    pub async fn load_chunk(&self, paths: &[PathBuf], existing_ids: &HashSet<Uuid>) -> EmbedResult<Vec<Item>> {
        let semaphore = Arc::new(Semaphore::new(self.file_readers));
        let mut tasks = Vec::with_capacity(paths.len());

        for path in paths {
            let permit = semaphore.clone();
            let path = path.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                load_one(&path).await
            }));
        }

        let mut seen = HashSet::with_capacity(paths.len());
        let mut items = Vec::with_capacity(paths.len());
        for task in tasks {
            let Ok(Some(item)) = task.await else { continue };
            if existing_ids.contains(&item.id) {
                continue;
            }
            if !seen.insert(item.id) {
                continue;
            }
            items.push(item);
        }

        Ok(items)
    }
}

async fn load_one(path: &Path) -> Option<Item> {
    let name = path.file_name()?.to_str()?;
    let parsed = ReadmeFileName::parse(name)?;
    let bytes = tokio::fs::read(path).await.ok()?;
    let content = String::from_utf8_lossy(&bytes);
    Item::from_raw(format!("{}/{}", parsed.owner, parsed.repo), &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn loads_and_parses_valid_readmes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "foo_bar_master_README.md", "# hello readme content").await;

        let loader = ItemLoader::default();
        let items = loader.load_chunk(&[path], &HashSet::new()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].repo, "foo/bar");
    }

    #[tokio::test]
    async fn drops_content_under_minimum_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "foo_bar_master_README.md", "short").await;

        let loader = ItemLoader::default();
        let items = loader.load_chunk(&[path], &HashSet::new()).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn skips_unparseable_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "not_a_valid_name.md", "# hello readme content").await;

        let loader = ItemLoader::default();
        let items = loader.load_chunk(&[path], &HashSet::new()).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn drops_items_already_in_the_existing_id_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "foo_bar_master_README.md", "# hello readme content").await;

        let probe = load_one(&path).await.unwrap();
        let mut existing = HashSet::new();
        existing.insert(probe.id);

        let loader = ItemLoader::default();
        let items = loader.load_chunk(&[path], &existing).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn deduplicates_identical_content_within_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "foo_bar_master_README.md", "# hello readme content").await;
        let b = write(&dir, "baz_qux_main_README.md", "# hello readme content").await;

        let loader = ItemLoader::default();
        let items = loader.load_chunk(&[a, b], &HashSet::new()).await.unwrap();
        assert_eq!(items.len(), 1);
    }
}
