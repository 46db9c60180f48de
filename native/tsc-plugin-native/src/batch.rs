//! Batch Module
//!
//! Runs a transform stage over a set of files or directories outside a host
//! bundler. Configuration is resolved before any file work starts; files are
//! then processed in parallel.

use rayon::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;
use crate::plugin::{LoadResult, TransformStage};
use crate::transpile::Transpiler;

#[derive(Debug)]
pub struct BatchEntry {
    pub path: PathBuf,
    pub outcome: Result<Option<LoadResult>>,
}

impl BatchEntry {
    pub fn is_replaced(&self) -> bool {
        matches!(self.outcome, Ok(Some(_)))
    }
}

/// Recursively find files under `roots` whose path matches `filter`.
/// Explicit file roots are kept even when they do not match.
pub fn collect_sources(roots: &[PathBuf], filter: &Regex) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for root in roots {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        for entry in WalkDir::new(root).follow_links(true) {
            if let Ok(entry) = entry {
                let path = entry.path();
                if path.is_file() && !in_node_modules(path) && filter.is_match(&path.to_string_lossy())
                {
                    files.push(path.to_path_buf());
                }
            }
        }
    }

    files.sort();
    files.dedup();
    files
}

fn in_node_modules(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str() == "node_modules")
}

/// Load every path through `stage`. Fails only if the configuration cannot be
/// resolved; per-file failures are reported in their entry.
pub fn load_all<T: Transpiler>(stage: &TransformStage<T>, paths: &[PathBuf]) -> Result<Vec<BatchEntry>> {
    stage.config()?;

    Ok(paths
        .par_iter()
        .map(|path| BatchEntry {
            path: path.clone(),
            outcome: stage.load(path),
        })
        .collect())
}
