//! Parallel repository scanning.
//!
//! Producer collects file paths, a fixed pool of worker threads scans them,
//! and the collector merges per-file results. The channel is sized to hold
//! every path so enqueueing never blocks once the walk is done. Parallel and
//! sequential runs produce identical `tables`/`columns` sets and file counts;
//! only the ordering of `refs` may differ.

use super::{
    is_skip_dir, is_supported, relative_path, scan, scan_file, unique_columns, unique_tables,
    ColumnRef, ScanResult, TableRef,
};
use anyhow::{anyhow, Context as _, Result};
use crossbeam_channel::bounded;
use std::path::{Path, PathBuf};
use std::thread;
use walkdir::WalkDir;

struct FileResult {
    refs: Vec<TableRef>,
    col_refs: Vec<ColumnRef>,
    result: Result<()>,
}

/// Walk a code repository using a pool of worker threads.
///
/// `workers == 0` means one worker per CPU; `workers == 1` falls back to the
/// sequential scan.
pub fn scan_parallel(repo_path: &Path, workers: usize) -> Result<ScanResult> {
    let workers = if workers == 0 {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
    } else {
        workers
    };
    if workers == 1 {
        return scan(repo_path);
    }

    // Phase 1: collect file paths
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut skipped = 0usize;

    let walker = WalkDir::new(repo_path).into_iter().filter_entry(|e| {
        !(e.file_type().is_dir() && e.file_name().to_str().is_some_and(is_skip_dir))
    });
    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", repo_path.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !is_supported(entry.path()) {
            skipped += 1;
            continue;
        }
        paths.push(entry.into_path());
    }

    // Phase 2: fan out to workers
    let (path_tx, path_rx) = bounded::<PathBuf>(paths.len().max(1));
    let (result_tx, result_rx) = bounded::<FileResult>(paths.len().max(1));

    for p in &paths {
        path_tx
            .send(p.clone())
            .map_err(|_| anyhow!("scan worker pool shut down early"))?;
    }
    drop(path_tx);

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let rx = path_rx.clone();
        let tx = result_tx.clone();
        let root = repo_path.to_path_buf();

        handles.push(thread::spawn(move || {
            for path in rx {
                let rel = relative_path(&root, &path);
                let fr = match scan_file(&path, &rel) {
                    Ok((refs, col_refs)) => FileResult {
                        refs,
                        col_refs,
                        result: Ok(()),
                    },
                    Err(e) => FileResult {
                        refs: Vec::new(),
                        col_refs: Vec::new(),
                        result: Err(e.context(format!("scan {}", rel))),
                    },
                };
                if tx.send(fr).is_err() {
                    break;
                }
            }
        }));
    }
    drop(path_rx);
    drop(result_tx);

    // Phase 3: merge results
    let mut result = ScanResult {
        repo_path: repo_path.display().to_string(),
        files_skipped: skipped,
        ..Default::default()
    };
    let mut first_err = None;

    for fr in result_rx {
        match fr.result {
            Ok(()) => {
                result.refs.extend(fr.refs);
                result.column_refs.extend(fr.col_refs);
                result.files_scanned += 1;
            }
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    if let Some(e) = first_err {
        return Err(e);
    }

    result.tables = unique_tables(&result.refs);
    result.columns = unique_columns(&result.column_refs);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn seed_repo() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        for i in 0..12 {
            fs::write(
                dir.path().join(format!("file{i}.go")),
                format!("db.Query(\"SELECT * FROM table_{i}\")\n"),
            )
            .unwrap();
        }
        fs::write(dir.path().join("model.py"), "__tablename__ = 'users'\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not scanned\n").unwrap();
        dir
    }

    #[test]
    fn parallel_matches_sequential() {
        let dir = seed_repo();

        let sequential = scan(dir.path()).unwrap();
        for workers in [2, 4, 8] {
            let parallel = scan_parallel(dir.path(), workers).unwrap();
            assert_eq!(parallel.tables, sequential.tables, "workers={workers}");
            assert_eq!(parallel.columns, sequential.columns, "workers={workers}");
            assert_eq!(parallel.files_scanned, sequential.files_scanned);
            assert_eq!(parallel.files_skipped, sequential.files_skipped);
        }
    }

    #[test]
    fn one_worker_is_sequential() {
        let dir = seed_repo();
        let result = scan_parallel(dir.path(), 1).unwrap();
        assert_eq!(result.files_scanned, 13);
        assert_eq!(result.files_skipped, 1);
        assert!(result.tables.contains(&"users".to_string()));
    }

    #[test]
    fn empty_repo() {
        let dir = tempdir().unwrap();
        let result = scan_parallel(dir.path(), 4).unwrap();
        assert_eq!(result.files_scanned, 0);
        assert!(result.tables.is_empty());
    }
}
