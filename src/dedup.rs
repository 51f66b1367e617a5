use std::path::{Path, PathBuf};
use console::style;
use serde::Serialize;

use crate::utils::{display_path, format_file_size};
use crate::{DedupResult, DuplicateIdentifier, ImageRecord};

const RESOLUTION_WEIGHT: f64 = 0.9;
const SIZE_WEIGHT: f64 = 0.1;
const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Keeper score: resolution dominates, size in MiB breaks near-ties
pub fn score(record: &ImageRecord) -> f64 {
    RESOLUTION_WEIGHT * record.pixels() as f64
        + SIZE_WEIGHT * (record.file_size as f64 / BYTES_PER_MIB)
}

/// Index of the record worth keeping; the first one wins exact ties
pub fn suggest_best_file(records: &[ImageRecord]) -> usize {
    let mut best_idx = 0;
    let mut best_score = f64::NEG_INFINITY;

    for (idx, record) in records.iter().enumerate() {
        let score = score(record);
        if score > best_score {
            best_score = score;
            best_idx = idx;
        }
    }

    best_idx
}

/// `first8...last8`, or `N/A` for a missing hash
pub fn abbreviate_hash(hash: &str) -> String {
    if hash.is_empty() {
        "N/A".to_string()
    } else if hash.len() <= 16 {
        hash.to_string()
    } else {
        format!("{}...{}", &hash[..8], &hash[hash.len() - 8..])
    }
}

/// Print one group with numbered members, paths relative to `root` if given
pub fn print_group(
    number: usize,
    identifier: &DuplicateIdentifier,
    records: &[ImageRecord],
    root: Option<&Path>,
) {
    let camera = if identifier.camera_model.is_empty() {
        "N/A"
    } else {
        identifier.camera_model.as_str()
    };

    println!();
    println!("{}", style(format!("Duplicate images group {}:", number)).bold());
    println!("  Camera Model: {}", camera);
    println!("  Hash: {}", abbreviate_hash(&identifier.content_hash));

    let suggested = suggest_best_file(records);
    for (idx, record) in records.iter().enumerate() {
        let resolution = record
            .resolution
            .map(|(w, h)| format!("{}x{}", w, h))
            .unwrap_or_else(|| "Unknown".to_string());
        let path = match root {
            Some(root) => display_path(&record.path, root),
            None => record.path.to_string_lossy(),
        };
        let marker = if idx == suggested { "★" } else { " " };

        println!("  {} [{}] {}", marker, idx + 1, path);
        println!(
            "        Size: {}, Resolution: {}",
            format_file_size(record.file_size),
            resolution
        );
    }
}

/// Summary statistics for a scan
#[derive(Debug, Default, Serialize)]
pub struct DedupAnalysis {
    pub total_groups: usize,
    pub total_duplicates: usize,
    /// Bytes freed by removing everything but the suggested keepers
    pub reclaimable_space: u64,
    pub small_files: usize,  // <= 1KB
    pub medium_files: usize, // 1KB - 1MB
    pub large_files: usize,  // > 1MB
    pub largest_waste: Option<(PathBuf, u64)>,
}

/// Analyze the scan results assuming the suggested keeper of each group stays
pub fn analyze_duplicates(scan_result: &DedupResult) -> DedupAnalysis {
    let mut analysis = DedupAnalysis::default();

    for records in scan_result.duplicates.values() {
        let keep_idx = suggest_best_file(records);
        analysis.total_groups += 1;

        let mut group_waste = 0;
        for (idx, record) in records.iter().enumerate() {
            if idx == keep_idx {
                continue;
            }
            analysis.total_duplicates += 1;
            group_waste += record.file_size;

            match record.file_size {
                0..=1024 => analysis.small_files += 1,
                1025..=1048576 => analysis.medium_files += 1,
                _ => analysis.large_files += 1,
            }
        }
        analysis.reclaimable_space += group_waste;

        let is_larger = analysis
            .largest_waste
            .as_ref()
            .map_or(group_waste > 0, |(_, waste)| group_waste > *waste);
        if is_larger {
            analysis.largest_waste = Some((records[keep_idx].path.clone(), group_waste));
        }
    }

    analysis
}

impl DedupAnalysis {
    pub fn print_analysis(&self) {
        println!();
        println!("{}", style("📈 Summary").green().bold());
        println!("{}", style("-".repeat(20)).green());
        println!("Duplicate groups found: {}", self.total_groups);
        println!("Duplicate files: {}", self.total_duplicates);
        println!("Potential space savings: {}", format_file_size(self.reclaimable_space));

        if self.total_duplicates > 0 {
            println!();
            println!("{}", style("📊 File Size Distribution:").bold());
            println!("  Small files (≤1KB): {}", self.small_files);
            println!("  Medium files (1KB-1MB): {}", self.medium_files);
            println!("  Large files (>1MB): {}", self.large_files);
        }

        if let Some((path, waste)) = &self.largest_waste {
            println!();
            println!("{}", style("🎯 Largest opportunity:").bold());
            println!("  Keeper: {}", path.display());
            println!("  Potential savings: {}", format_file_size(*waste));
        }
    }
}

/// One duplicate group as written to the JSON report
#[derive(Debug, Serialize)]
pub struct GroupReport<'a> {
    pub identifier: &'a DuplicateIdentifier,
    pub suggested_keeper: usize,
    pub files: &'a [ImageRecord],
}

/// Machine-readable report of every duplicate group
#[derive(Debug, Serialize)]
pub struct ScanReport<'a> {
    pub total_files: usize,
    pub total_size: u64,
    pub groups: Vec<GroupReport<'a>>,
    pub analysis: DedupAnalysis,
}

pub fn build_report(scan_result: &DedupResult) -> ScanReport<'_> {
    let groups = scan_result
        .sorted_groups()
        .into_iter()
        .map(|(identifier, records)| GroupReport {
            identifier,
            suggested_keeper: suggest_best_file(records),
            files: records,
        })
        .collect();

    ScanReport {
        total_files: scan_result.total_files,
        total_size: scan_result.total_size,
        groups,
        analysis: analyze_duplicates(scan_result),
    }
}
