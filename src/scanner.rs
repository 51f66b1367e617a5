use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::{DedupError, ExtractError, ToolError};
use crate::extract;
use crate::tool::{ExifTool, MetadataTool};
use crate::utils::is_readable;
use crate::{DedupResult, ImageRecord};

const MAX_DEFAULT_WORKERS: usize = 32;
const WORKERS_PER_CORE: usize = 4;

/// Configuration for image scanning
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Worker count override; `None` or `Some(0)` picks the default
    pub workers: Option<usize>,
    /// Use the metadata tool for every resolution lookup
    pub force_tool: bool,
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: None,
            force_tool: false,
            show_progress: true,
        }
    }
}

/// `min(32, 4 × available cores)`
pub fn default_worker_count() -> usize {
    let cores = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores * WORKERS_PER_CORE).min(MAX_DEFAULT_WORKERS)
}

/// Scanner for finding duplicate images
pub struct Scanner {
    config: ScanConfig,
    tool: Arc<dyn MetadataTool>,
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
            tool: Arc::new(ExifTool::new()),
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn MetadataTool>) -> Self {
        self.tool = tool;
        self
    }

    pub fn set_workers(&mut self, workers: Option<usize>) {
        self.config.workers = workers;
    }

    pub fn set_force_tool(&mut self, force_tool: bool) {
        self.config.force_tool = force_tool;
    }

    pub fn set_show_progress(&mut self, show_progress: bool) {
        self.config.show_progress = show_progress;
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn worker_count(&self) -> usize {
        match self.config.workers {
            Some(n) if n > 0 => n,
            _ => default_worker_count(),
        }
    }

    /// Scan `root` recursively and group the images that are duplicates.
    ///
    /// Fails before touching any file when the root is missing or when
    /// force-tool mode is requested without a working tool.
    pub fn scan_directory(&self, root: &Path) -> Result<DedupResult, DedupError> {
        if !root.is_dir() {
            return Err(DedupError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let tool_available = self.tool.probe().is_some();
        if !tool_available {
            if self.config.force_tool {
                return Err(DedupError::ToolUnavailable {
                    program: self.tool.name().to_string(),
                });
            }
            warn!(
                "{} not found. Metadata extraction will be limited.",
                self.tool.name()
            );
        }

        let files = self.collect_files(root);
        info!("Found {} image files to process.", files.len());

        if files.is_empty() {
            return Ok(DedupResult::new());
        }

        self.process_files(files, tool_available)
    }

    /// Collect every supported image under `root`, in file-name order
    fn collect_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() && extract::is_supported_image(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files
    }

    /// Extract metadata on a bounded pool and build the grouped result
    fn process_files(
        &self,
        files: Vec<PathBuf>,
        tool_available: bool,
    ) -> Result<DedupResult, DedupError> {
        let workers = self.worker_count();
        debug!("Processing with {} workers", workers);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;

        let progress = if self.config.show_progress {
            ProgressBar::new(files.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        ) {
            progress.set_style(style.progress_chars("##-"));
        }

        let tool = self.tool.as_ref();
        let force_tool = self.config.force_tool;

        // Indexed collect keeps discovery order regardless of completion order
        let records: Vec<ImageRecord> = pool.install(|| {
            files
                .par_iter()
                .filter_map(|path| {
                    let record = process_file(path, tool, tool_available, force_tool);
                    progress.inc(1);
                    record
                })
                .collect()
        });

        progress.finish_and_clear();

        let mut result = DedupResult::new();
        for record in records {
            result.add_record(record);
        }
        result.filter_duplicates();

        info!(
            "Processed {} images, {} duplicate groups",
            result.total_files,
            result.duplicates.len()
        );

        Ok(result)
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the record for a single image.
///
/// Returns `None` only when the file cannot be read at all; any other
/// failure leaves the corresponding field empty.
pub fn process_file(
    path: &Path,
    tool: &dyn MetadataTool,
    tool_available: bool,
    force_tool: bool,
) -> Option<ImageRecord> {
    if !is_readable(path) {
        warn!("No read permission for {}", path.display());
        return None;
    }

    let file_size = extract::file_size(path).unwrap_or_else(|e| {
        error!("Error getting file size: {}", e);
        0
    });

    let camera_model = if tool_available {
        match extract::camera_model(path, tool) {
            Ok(model) => Some(model),
            Err(ExtractError::Tool {
                source: ToolError::EmptyOutput { .. },
                ..
            }) => {
                debug!("No camera model tag in {}", path.display());
                None
            }
            Err(e) => {
                warn!("Error extracting camera model: {}", e);
                None
            }
        }
    } else {
        None
    };

    let content_hash = extract::content_hash(path)
        .map_err(|e| error!("Error calculating hash: {}", e))
        .ok();

    let resolution = match extract::image_resolution(path, tool, tool_available, force_tool) {
        Ok(resolution) => Some(resolution),
        Err(e @ ExtractError::NoStrategy { .. }) => {
            debug!("{}", e);
            None
        }
        Err(e) => {
            warn!("Error getting resolution: {}", e);
            None
        }
    };

    Some(ImageRecord {
        path: path.to_path_buf(),
        file_size,
        content_hash,
        camera_model,
        resolution,
    })
}
