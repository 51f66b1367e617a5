pub mod actions;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod logging;
pub mod prompt;
pub mod scanner;
pub mod tool;
pub mod utils;

use std::collections::HashMap;
use std::path::PathBuf;
use serde::Serialize;

pub use actions::{execute_actions, ActionPlan, ActionResult, Confirmation, KeepPolicy};
pub use dedup::{score, suggest_best_file};
pub use error::{DedupError, ExtractError, ToolError};
pub use prompt::{DialoguerPrompter, Prompter, ScriptedPrompter};
pub use scanner::{process_file, Scanner};
pub use tool::{ExifTool, MetadataTool, ToolField};

/// Metadata gathered for one image file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    /// Size in bytes, 0 when it could not be read
    pub file_size: u64,
    /// Hex SHA-256 of the full content
    pub content_hash: Option<String>,
    pub camera_model: Option<String>,
    /// (width, height) in pixels
    pub resolution: Option<(u32, u32)>,
}

impl ImageRecord {
    pub fn identifier(&self) -> DuplicateIdentifier {
        DuplicateIdentifier {
            camera_model: self.camera_model.clone().unwrap_or_default(),
            content_hash: self.content_hash.clone().unwrap_or_default(),
            resolution: self.resolution.unwrap_or((0, 0)),
            file_size: self.file_size,
        }
    }

    /// Pixel count, 0 when the resolution is unknown
    pub fn pixels(&self) -> u64 {
        self.resolution
            .map(|(w, h)| u64::from(w) * u64::from(h))
            .unwrap_or(0)
    }
}

/// Key that buckets records into duplicate groups.
///
/// Two records are duplicates exactly when all four fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DuplicateIdentifier {
    pub camera_model: String,
    pub content_hash: String,
    pub resolution: (u32, u32),
    pub file_size: u64,
}

/// Results of scanning a directory for duplicate images
#[derive(Debug, Default)]
pub struct DedupResult {
    pub duplicates: HashMap<DuplicateIdentifier, Vec<ImageRecord>>,
    pub total_files: usize,
    pub total_size: u64,
}

/// Actions that can be performed on duplicate images
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupAction {
    /// List duplicate groups without touching anything
    List,
    /// Delete every file except the keeper
    Delete,
    /// Move every file except the keeper under the given directory
    Move(PathBuf),
}

impl DedupResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&mut self, record: ImageRecord) {
        self.total_files += 1;
        self.total_size += record.file_size;

        self.duplicates
            .entry(record.identifier())
            .or_default()
            .push(record);
    }

    /// Number of files beyond the first in each group
    pub fn get_duplicate_count(&self) -> usize {
        self.duplicates
            .values()
            .map(|records| records.len().saturating_sub(1))
            .sum()
    }

    /// Drop identifiers with a single member
    pub fn filter_duplicates(&mut self) {
        self.duplicates.retain(|_, records| records.len() > 1);
    }

    /// Groups ordered by the path of their first member
    pub fn sorted_groups(&self) -> Vec<(&DuplicateIdentifier, &Vec<ImageRecord>)> {
        let mut groups: Vec<_> = self.duplicates.iter().collect();
        groups.sort_by(|a, b| a.1[0].path.cmp(&b.1[0].path));
        groups
    }
}
