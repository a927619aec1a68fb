use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use readmevec_core::{ErrorBucket, ErrorMarker, ReadmeFileName};

use crate::error::FetchResult;

/// Owns the on-disk README directory: successful fetches land as
/// `<owner>_<repo>_<branch>_<filename>`, permanent failures as empty
/// markers under `.errors/<bucket>/<owner>_<repo>`.
///
/// Status-bucket directories are created lazily, once per process, the
/// first time a marker for that bucket is written.
pub struct ReadmeStore {
    root: PathBuf,
    errors_root: PathBuf,
    created_buckets: Mutex<HashSet<String>>,
}

impl ReadmeStore {
    pub fn new(readmes_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = readmes_dir.into();
        let errors_root = root.join(".errors");
        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(&errors_root)?;
        Ok(Self {
            root,
            errors_root,
            created_buckets: Mutex::new(HashSet::new()),
        })
    }

    pub fn success_path(&self, name: &ReadmeFileName) -> PathBuf {
        self.root.join(name.to_string())
    }

    fn error_dir(&self, bucket: &ErrorBucket) -> FetchResult<PathBuf> {
        let bucket_name = bucket.bucket_name();
        let dir = self.errors_root.join(&bucket_name);
        let mut created = self.created_buckets.lock().unwrap();
        if !created.contains(&bucket_name) {
            std::fs::create_dir_all(&dir)?;
            created.insert(bucket_name);
        }
        Ok(dir)
    }

    /// Writes a successfully fetched README to disk.
    pub fn write_success(&self, name: &ReadmeFileName, content: &[u8]) -> FetchResult<()> {
        std::fs::write(self.success_path(name), content)?;
        Ok(())
    }

    /// Touches an empty marker file recording a permanent failure.
    pub fn write_error_marker(&self, marker: &ErrorMarker) -> FetchResult<()> {
        let dir = self.error_dir(&marker.bucket)?;
        std::fs::write(dir.join(marker.file_name()), b"")?;
        Ok(())
    }

    /// Checks whether any marker exists for `owner_repo` under any bucket
    /// already known to this process. Intended for the in-memory skip path
    /// (primary instance), not the filesystem probe used by parallel
    /// instances.
    pub fn has_known_error_bucket(&self, bucket: &ErrorBucket, owner: &str, repo: &str) -> bool {
        self.errors_root
            .join(bucket.bucket_name())
            .join(format!("{owner}_{repo}"))
            .exists()
    }

    /// Filesystem existence probe used by parallel instances that have not
    /// preloaded an in-memory existing-set. Checks both branches the Fetch
    /// Engine tries, but only the `README.md` candidate, since this probe
    /// runs once per origin and walking every candidate filename per call
    /// would be too slow at archive scale.
    pub fn probably_done_on_disk(&self, owner: &str, repo: &str) -> bool {
        for branch in crate::candidates::BRANCHES {
            let candidate = self.root.join(format!("{owner}_{repo}_{branch}_README.md"));
            if candidate.exists() {
                return true;
            }
        }
        self.has_known_error_marker(owner, repo)
    }

    /// Scans the error-bucket directories for any marker already recorded
    /// for `owner_repo`, regardless of which bucket it landed in.
    pub fn has_known_error_marker(&self, owner: &str, repo: &str) -> bool {
        if let Ok(entries) = std::fs::read_dir(&self.errors_root) {
            for entry in entries.flatten() {
                if entry.path().join(format!("{owner}_{repo}")).exists() {
                    return true;
                }
            }
        }
        false
    }

    /// Lists the readmes directory once and parses every success file name
    /// back to its `owner_repo` key, matching every candidate branch and
    /// filename the Fetch Engine tries. Built once at startup for the
    /// primary fetch instance so a restart recognizes a prior success
    /// stored under any candidate filename, not just `README.md`.
    pub fn load_existing_success_set(&self) -> FetchResult<HashSet<String>> {
        let mut set = HashSet::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            for branch in crate::candidates::BRANCHES {
                for filename in crate::candidates::README_NAMES {
                    let suffix = format!("_{branch}_{filename}");
                    if let Some(owner_repo) = name.strip_suffix(&suffix) {
                        set.insert(owner_repo.to_string());
                    }
                }
            }
        }
        Ok(set)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
