use std::fs;
use std::io::Read;
use std::path::Path;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::ExtractError;
use crate::tool::{MetadataTool, ToolField};

const HASH_CHUNK_SIZE: usize = 4096;

/// Sony RAW, which the decoding library cannot read
pub const RAW_EXTENSIONS: &[&str] = &["arw"];

/// Formats the in-process decoder handles
pub const RASTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "gif", "bmp"];

/// How the resolution of a file is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Ask the external metadata tool
    Tool,
    /// Read the header with the `image` crate, falling back to the tool
    Library,
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

pub fn is_raw_file(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| RAW_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_raster_file(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| RASTER_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether the scanner should pick up this file at all
pub fn is_supported_image(path: &Path) -> bool {
    is_raw_file(path) || is_raster_file(path)
}

/// SHA-256 of the whole file, as lowercase hex
pub fn content_hash(path: &Path) -> Result<String, ExtractError> {
    let io_error = |source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::open(path).map_err(io_error)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(io_error)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn file_size(path: &Path) -> Result<u64, ExtractError> {
    fs::metadata(path)
        .map(|metadata| metadata.len())
        .map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })
}

pub fn camera_model(path: &Path, tool: &dyn MetadataTool) -> Result<String, ExtractError> {
    tool.read_field(path, ToolField::CameraModel)
        .map_err(|source| ExtractError::Tool {
            path: path.to_path_buf(),
            source,
        })
}

/// Parse tool output as `WIDTHxHEIGHT` or as two lines holding one integer each
pub fn parse_dimensions(output: &str) -> Option<(u32, u32)> {
    let output = output.trim();
    let (width, height) = output
        .split_once('x')
        .or_else(|| output.split_once('\n'))?;

    let width: u32 = width.trim().parse().ok()?;
    let height: u32 = height.trim().parse().ok()?;

    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

pub fn resolution_from_tool(
    path: &Path,
    tool: &dyn MetadataTool,
) -> Result<(u32, u32), ExtractError> {
    let output = tool
        .read_field(path, ToolField::Dimensions)
        .map_err(|source| ExtractError::Tool {
            path: path.to_path_buf(),
            source,
        })?;

    parse_dimensions(&output).ok_or_else(|| ExtractError::Dimensions {
        path: path.to_path_buf(),
        output,
    })
}

pub fn resolution_from_library(path: &Path) -> Result<(u32, u32), ExtractError> {
    image::image_dimensions(path).map_err(|e| ExtractError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Pick the first strategy that applies, in priority order:
/// forced tool, RAW with tool, raster via the library, nothing.
pub fn select_strategy(
    path: &Path,
    tool_available: bool,
    force_tool: bool,
) -> Option<ResolutionStrategy> {
    if force_tool && tool_available {
        return Some(ResolutionStrategy::Tool);
    }
    if is_raw_file(path) && tool_available {
        return Some(ResolutionStrategy::Tool);
    }
    if is_raster_file(path) {
        return Some(ResolutionStrategy::Library);
    }
    None
}

/// Resolve the pixel dimensions of `path` using the strategy selected for it
pub fn image_resolution(
    path: &Path,
    tool: &dyn MetadataTool,
    tool_available: bool,
    force_tool: bool,
) -> Result<(u32, u32), ExtractError> {
    match select_strategy(path, tool_available, force_tool) {
        Some(ResolutionStrategy::Tool) => resolution_from_tool(path, tool),
        Some(ResolutionStrategy::Library) => match resolution_from_library(path) {
            Ok(dimensions) => Ok(dimensions),
            Err(e) if tool_available => {
                warn!("{}", e);
                info!("Trying {} for resolution of {}", tool.name(), path.display());
                resolution_from_tool(path, tool)
            }
            Err(e) => Err(e),
        },
        None => Err(ExtractError::NoStrategy {
            path: path.to_path_buf(),
        }),
    }
}
