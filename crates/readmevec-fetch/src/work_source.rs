use std::path::{Path, PathBuf};

use readmevec_core::Origin;

use crate::error::{FetchError, FetchResult};

/// Default batch size the source hands back per [`WorkSource::next_batch`]
/// call, so the outer scheduler never has to materialize the whole archive.
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

/// Parameters for opening a [`WorkSource`] against a columnar archive.
pub struct WorkSourceConfig {
    pub archive_path: PathBuf,
    pub table_name: String,
    pub min_date: Option<String>,
    pub offset: u64,
    pub limit: Option<u64>,
}

/// Streams origin URLs from a CSV archive with a crash-safe, resumable
/// cursor. A primary instance (`offset == 0`) owns the whole filtered table;
/// a parallel instance (`offset > 0`) only ever materializes its own slice
/// and persists its cursor under a distinct key so two instances can run
/// against the same archive without clobbering each other's progress.
pub struct WorkSource {
    cursor_db: sled::Db,
    cursor_key: String,
    rows: Vec<Origin>,
}

impl WorkSource {
    /// Opens the cursor store at `cursor_db_path` and materializes the
    /// filtered, cursor-advanced row set described by `config`.
    pub fn open(cursor_db_path: impl AsRef<Path>, config: WorkSourceConfig) -> FetchResult<Self> {
        let cursor_db = sled::open(cursor_db_path)?;
        let cursor_key = cursor_key_for(&config.table_name, config.offset);

        let mut rows = load_filtered_rows(&config.archive_path, config.min_date.as_deref())?;
        if config.offset > 0 {
            let upper = config.limit.map(|limit| config.offset + limit);
            rows.retain(|o| o.row_id > config.offset && upper.map_or(true, |u| o.row_id <= u));
        } else if let Some(limit) = config.limit {
            rows.retain(|o| o.row_id <= limit);
        }

        let last_seen = read_cursor(&cursor_db, &cursor_key)?;
        rows.retain(|o| o.row_id > last_seen);

        Ok(Self { cursor_db, cursor_key, rows })
    }

    /// Returns up to `batch_size` origins in row-id order and durably
    /// advances the cursor past the last one returned. An empty result
    /// means the source is exhausted.
    pub fn next_batch(&mut self, batch_size: usize) -> FetchResult<Vec<Origin>> {
        if self.rows.is_empty() {
            return Ok(Vec::new());
        }
        let take = batch_size.min(self.rows.len());
        let batch: Vec<Origin> = self.rows.drain(..take).collect();
        if let Some(last) = batch.last() {
            self.cursor_db
                .insert(self.cursor_key.as_bytes(), &last.row_id.to_be_bytes())?;
            self.cursor_db.flush()?;
        }
        Ok(batch)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

fn cursor_key_for(table_name: &str, offset: u64) -> String {
    if offset == 0 {
        table_name.to_string()
    } else {
        format!("{table_name}_{offset}")
    }
}

fn read_cursor(db: &sled::Db, key: &str) -> FetchResult<u64> {
    match db.get(key.as_bytes())? {
        Some(bytes) => {
            let array: [u8; 8] = bytes
                .as_ref()
                .try_into()
                .map_err(|_| FetchError::WorkSource(format!("corrupt cursor value for {key}")))?;
            Ok(u64::from_be_bytes(array))
        }
        None => Ok(0),
    }
}

fn load_filtered_rows(archive_path: &Path, min_date: Option<&str>) -> FetchResult<Vec<Origin>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(archive_path)?;

    let headers = reader.headers()?.clone();
    let row_id_idx = headers
        .iter()
        .position(|h| h == "row_id")
        .ok_or_else(|| FetchError::WorkSource("archive missing row_id column".to_string()))?;
    let url_idx = headers
        .iter()
        .position(|h| h == "url")
        .ok_or_else(|| FetchError::WorkSource("archive missing url column".to_string()))?;
    let date_idx = headers.iter().position(|h| h == "created_at");

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;

        if let (Some(min), Some(idx)) = (min_date, date_idx) {
            if let Some(created_at) = record.get(idx) {
                if created_at < min {
                    continue;
                }
            }
        }

        let row_id: u64 = record
            .get(row_id_idx)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| FetchError::WorkSource("archive row has non-numeric row_id".to_string()))?;
        let url = record
            .get(url_idx)
            .ok_or_else(|| FetchError::WorkSource("archive row missing url".to_string()))?
            .to_string();

        rows.push(Origin { row_id, url });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_archive(dir: &tempfile::TempDir, rows: &[(u64, &str, &str)]) -> PathBuf {
        let path = dir.path().join("archive.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "row_id,url,created_at").unwrap();
        for (id, url, date) in rows {
            writeln!(file, "{id},{url},{date}").unwrap();
        }
        path
    }

    #[test]
    fn primary_instance_emits_all_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            &dir,
            &[
                (1, "https://github.com/a/b", "2020-01-01"),
                (2, "https://github.com/c/d", "2020-01-02"),
            ],
        );
        let mut source = WorkSource::open(
            dir.path().join("cursor.sled"),
            WorkSourceConfig {
                archive_path: archive,
                table_name: "readmes".to_string(),
                min_date: None,
                offset: 0,
                limit: None,
            },
        )
        .unwrap();

        let batch = source.next_batch(10).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].row_id, 1);
        assert!(source.is_exhausted());
    }

    #[test]
    fn cursor_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            &dir,
            &[
                (1, "https://github.com/a/b", "2020-01-01"),
                (2, "https://github.com/c/d", "2020-01-02"),
                (3, "https://github.com/e/f", "2020-01-03"),
            ],
        );
        let cursor_path = dir.path().join("cursor.sled");
        let config = || WorkSourceConfig {
            archive_path: archive.clone(),
            table_name: "readmes".to_string(),
            min_date: None,
            offset: 0,
            limit: None,
        };

        {
            let mut source = WorkSource::open(&cursor_path, config()).unwrap();
            let first = source.next_batch(2).unwrap();
            assert_eq!(first.len(), 2);
        }

        let mut resumed = WorkSource::open(&cursor_path, config()).unwrap();
        let remainder = resumed.next_batch(10).unwrap();
        assert_eq!(remainder.len(), 1);
        assert_eq!(remainder[0].row_id, 3);
    }

    #[test]
    fn min_date_filters_out_older_rows() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            &dir,
            &[
                (1, "https://github.com/a/b", "2019-06-01"),
                (2, "https://github.com/c/d", "2021-01-01"),
            ],
        );
        let mut source = WorkSource::open(
            dir.path().join("cursor.sled"),
            WorkSourceConfig {
                archive_path: archive,
                table_name: "readmes".to_string(),
                min_date: Some("2020-01-01".to_string()),
                offset: 0,
                limit: None,
            },
        )
        .unwrap();

        let batch = source.next_batch(10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].row_id, 2);
    }

    #[test]
    fn parallel_instance_uses_a_distinct_cursor_key_and_its_own_slice() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            &dir,
            &[
                (1, "https://github.com/a/b", "2020-01-01"),
                (2, "https://github.com/c/d", "2020-01-01"),
                (3, "https://github.com/e/f", "2020-01-01"),
                (4, "https://github.com/g/h", "2020-01-01"),
            ],
        );
        let cursor_path = dir.path().join("cursor.sled");

        let mut primary = WorkSource::open(
            &cursor_path,
            WorkSourceConfig {
                archive_path: archive.clone(),
                table_name: "readmes".to_string(),
                min_date: None,
                offset: 0,
                limit: Some(2),
            },
        )
        .unwrap();
        let primary_batch = primary.next_batch(10).unwrap();
        assert_eq!(primary_batch.iter().map(|o| o.row_id).collect::<Vec<_>>(), vec![1, 2]);

        let mut parallel = WorkSource::open(
            &cursor_path,
            WorkSourceConfig {
                archive_path: archive,
                table_name: "readmes".to_string(),
                min_date: None,
                offset: 2,
                limit: Some(2),
            },
        )
        .unwrap();
        let parallel_batch = parallel.next_batch(10).unwrap();
        assert_eq!(parallel_batch.iter().map(|o| o.row_id).collect::<Vec<_>>(), vec![3, 4]);
    }
}
