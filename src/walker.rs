//! Template file discovery
//!
//! Lists the files of one template directory that match the inventory's glob
//! pattern, in lexical order, together with their modification times. The
//! recorded list is what change detection compares against.

use crate::error::{InventoryError, Result};
use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// A template file and its modification time at scan time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Non-recursive pattern matcher over template directories
#[derive(Debug, Clone)]
pub struct TemplateWalker {
    pattern: String,
    matcher: GlobMatcher,
}

impl TemplateWalker {
    pub fn new(pattern: &str) -> Result<Self> {
        let matcher = Glob::new(pattern)
            .map_err(|e| InventoryError::InvalidFilePattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?
            .compile_matcher();
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether a bare file name matches the pattern.
    pub fn matches(&self, file_name: &str) -> bool {
        self.matcher.is_match(file_name)
    }

    /// Matching files directly inside `dir`, sorted by path. A missing
    /// directory yields no files.
    pub fn scan(&self, dir: &Path) -> Result<Vec<FileStamp>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut stamps = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                InventoryError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to walk directory {:?}: {}", dir, e),
                ))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !self.matches(&name) {
                continue;
            }
            let modified = entry
                .metadata()
                .map_err(|e| {
                    InventoryError::IoError(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("Failed to read metadata for {:?}: {}", entry.path(), e),
                    ))
                })?
                .modified()?;
            stamps.push(FileStamp {
                path: entry.into_path(),
                modified,
            });
        }

        stamps.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(stamps)
    }
}
