use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use photo_dedup::actions::{execute_actions, ActionPlan, KeepPolicy};
use photo_dedup::{
    DedupAction, DedupError, MetadataTool, Scanner, ScriptedPrompter, ToolError, ToolField,
};
use tempfile::TempDir;

/// Reports one camera model for every file and counts invocations
struct FakeExifTool {
    available: bool,
    calls: AtomicUsize,
}

impl FakeExifTool {
    fn new(available: bool) -> Arc<Self> {
        Arc::new(Self {
            available,
            calls: AtomicUsize::new(0),
        })
    }
}

impl MetadataTool for FakeExifTool {
    fn name(&self) -> &str {
        "fake-exiftool"
    }

    fn probe(&self) -> Option<String> {
        self.available.then(|| "13.00".to_string())
    }

    fn read_field(&self, path: &Path, field: ToolField) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match field {
            ToolField::CameraModel => Ok("ILCE-7M3".to_string()),
            ToolField::Dimensions if path.extension().is_some_and(|e| e == "ARW") => {
                Ok("6000\n4000".to_string())
            }
            ToolField::Dimensions => Err(ToolError::EmptyOutput {
                program: self.name().to_string(),
            }),
        }
    }
}

fn scanner_with(tool: Arc<FakeExifTool>) -> Scanner {
    let mut scanner = Scanner::new().with_tool(tool);
    scanner.set_show_progress(false);
    scanner.set_workers(Some(4));
    scanner
}

fn write_png(path: &Path, width: u32, height: u32, shade: u8) {
    image::RgbImage::from_pixel(width, height, image::Rgb([shade, shade, shade]))
        .save(path)
        .unwrap();
}

#[test]
fn move_duplicates_into_group_directory() {
    let library = TempDir::new().unwrap();
    let archive = TempDir::new().unwrap();
    fs::create_dir(library.path().join("backup")).unwrap();

    fs::write(library.path().join("DSC0001.ARW"), b"sony raw payload").unwrap();
    fs::write(library.path().join("backup").join("DSC0001.ARW"), b"sony raw payload").unwrap();
    fs::write(library.path().join("DSC0002.ARW"), b"another raw payload").unwrap();

    let scanner = scanner_with(FakeExifTool::new(true));
    let scan = scanner.scan_directory(library.path()).unwrap();
    assert_eq!(scan.total_files, 3);
    assert_eq!(scan.duplicates.len(), 1);

    let (identifier, _) = scan.duplicates.iter().next().unwrap();
    let group_dir = archive
        .path()
        .join(format!("ILCE-7M3_{}", &identifier.content_hash[..8]));

    let plan = ActionPlan::for_action(&DedupAction::Move(archive.path().to_path_buf()))
        .unwrap()
        .with_keep(KeepPolicy::AutoBest);
    let mut prompter = ScriptedPrompter::new().confirm_with([true]);
    let result = execute_actions(&scan, &plan, &mut prompter).unwrap();

    assert_eq!(result.files_done, 1);
    assert_eq!(result.bytes_reclaimed, 16);

    let originals = [
        library.path().join("DSC0001.ARW"),
        library.path().join("backup").join("DSC0001.ARW"),
    ];
    let remaining = originals.iter().filter(|p| p.exists()).count();
    assert_eq!(remaining, 1);
    assert!(group_dir.join("DSC0001.ARW").exists());
    assert!(library.path().join("DSC0002.ARW").exists());
}

#[test]
fn auto_select_keeps_highest_resolution_and_deletes_rest() {
    let library = TempDir::new().unwrap();
    write_png(&library.path().join("a.png"), 16, 16, 200);
    fs::copy(library.path().join("a.png"), library.path().join("b.png")).unwrap();
    fs::copy(library.path().join("a.png"), library.path().join("c.png")).unwrap();
    write_png(&library.path().join("unique.png"), 32, 16, 10);

    let scanner = scanner_with(FakeExifTool::new(false));
    let scan = scanner.scan_directory(library.path()).unwrap();
    assert_eq!(scan.duplicates.len(), 1);
    assert_eq!(scan.duplicates.values().next().unwrap().len(), 3);

    let plan = ActionPlan::for_action(&DedupAction::Delete)
        .unwrap()
        .with_keep(KeepPolicy::AutoBest);
    let mut prompter = ScriptedPrompter::new().confirm_with([true]);
    let result = execute_actions(&scan, &plan, &mut prompter).unwrap();

    assert_eq!(result.files_done, 2);
    // equal scores keep the first file in discovery order
    assert!(library.path().join("a.png").exists());
    assert!(!library.path().join("b.png").exists());
    assert!(!library.path().join("c.png").exists());
    assert!(library.path().join("unique.png").exists());
}

#[test]
fn forced_tool_missing_processes_nothing() {
    let library = TempDir::new().unwrap();
    write_png(&library.path().join("a.png"), 4, 4, 1);
    fs::copy(library.path().join("a.png"), library.path().join("b.png")).unwrap();

    let tool = FakeExifTool::new(false);
    let mut scanner = scanner_with(tool.clone());
    scanner.set_force_tool(true);

    let err = scanner.scan_directory(library.path()).unwrap_err();
    assert!(matches!(err, DedupError::ToolUnavailable { .. }));
    assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    assert!(library.path().join("b.png").exists());
}

#[test]
fn forced_tool_reads_every_file_through_tool() {
    let library = TempDir::new().unwrap();
    write_png(&library.path().join("a.png"), 4, 4, 1);
    fs::copy(library.path().join("a.png"), library.path().join("b.png")).unwrap();

    let tool = FakeExifTool::new(true);
    let mut scanner = scanner_with(tool.clone());
    scanner.set_force_tool(true);

    let scan = scanner.scan_directory(library.path()).unwrap();
    // the fake tool has no dimensions for PNGs and forced mode does not fall back
    let (identifier, records) = scan.duplicates.iter().next().unwrap();
    assert_eq!(identifier.resolution, (0, 0));
    assert_eq!(records.len(), 2);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 4);
}
