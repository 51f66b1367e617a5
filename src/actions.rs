use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use console::style;
use tracing::{error, info, warn};

use crate::dedup::{print_group, suggest_best_file};
use crate::error::DedupError;
use crate::prompt::Prompter;
use crate::utils::{format_file_size, is_dir_writable, sanitize_component, unique_target};
use crate::{DedupAction, DedupResult, DuplicateIdentifier, ImageRecord};

const HASH_PREFIX_LEN: usize = 8;

/// How the file to keep in each group is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepPolicy {
    /// Ask the user for each group
    Manual,
    /// Keep the highest scoring file
    AutoBest,
}

/// When the user is asked to approve the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// One question before any group is touched
    Once,
    /// One question per group
    PerGroup,
}

/// What to do with the non-kept members of every group
#[derive(Debug, Clone)]
pub struct ActionPlan {
    pub keep: KeepPolicy,
    pub confirm: Confirmation,
    /// Move extras here instead of deleting them
    pub destination: Option<PathBuf>,
    pub dry_run: bool,
}

impl ActionPlan {
    /// Plan for a delete or move action; `List` has nothing to execute
    pub fn for_action(action: &DedupAction) -> Option<Self> {
        let destination = match action {
            DedupAction::List => return None,
            DedupAction::Delete => None,
            DedupAction::Move(dir) => Some(dir.clone()),
        };

        Some(Self {
            keep: KeepPolicy::Manual,
            confirm: Confirmation::Once,
            destination,
            dry_run: false,
        })
    }

    pub fn with_keep(mut self, keep: KeepPolicy) -> Self {
        self.keep = keep;
        self
    }

    pub fn with_confirmation(mut self, confirm: Confirmation) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Delete,
    Move { target: PathBuf },
}

/// Represents a single file operation
#[derive(Debug, Clone)]
pub struct FileOperation {
    pub path: PathBuf,
    pub kind: OperationKind,
    pub success: bool,
    pub error: Option<String>,
    pub space_saved: u64,
}

impl FileOperation {
    fn succeeded(path: &Path, kind: OperationKind, space_saved: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            success: true,
            error: None,
            space_saved,
        }
    }

    fn failed(path: &Path, kind: OperationKind, error: String) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            success: false,
            error: Some(error),
            space_saved: 0,
        }
    }
}

/// Per-group breakdown
#[derive(Debug, Clone)]
pub struct GroupSummary {
    pub name: String,
    /// `None` when the user skipped the group
    pub kept: Option<PathBuf>,
    pub files_processed: usize,
    pub space_saved: u64,
}

/// Outcome of a whole batch, with a breakdown per group
#[derive(Debug, Clone, Default)]
pub struct ActionResult {
    pub operations: Vec<FileOperation>,
    pub groups: Vec<GroupSummary>,
    pub files_done: usize,
    pub files_failed: usize,
    pub bytes_reclaimed: u64,
    /// The up-front confirmation was declined
    pub cancelled: bool,
}

impl ActionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one file against both the batch and its group
    fn record(&mut self, group: &mut GroupSummary, operation: FileOperation) {
        if operation.success {
            self.files_done += 1;
            self.bytes_reclaimed += operation.space_saved;
            group.files_processed += 1;
            group.space_saved += operation.space_saved;
        } else {
            self.files_failed += 1;
        }
        self.operations.push(operation);
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOperation> {
        self.operations.iter().filter(|op| !op.success)
    }

    pub fn print_summary(&self) {
        println!();
        println!("{}", style("📊 Action Summary").green().bold());
        println!("{}", style("-".repeat(20)).green());
        println!("Files processed: {}", self.files_done + self.files_failed);
        println!("Successful operations: {}", self.files_done);
        println!("Failed operations: {}", self.files_failed);
        println!("Total space saved: {}", format_file_size(self.bytes_reclaimed));

        if !self.groups.is_empty() {
            println!();
            println!("{}", style("Per group:").bold());
            for group in &self.groups {
                match &group.kept {
                    Some(_) => println!(
                        "  {}: {} files, {}",
                        group.name,
                        group.files_processed,
                        format_file_size(group.space_saved)
                    ),
                    None => println!("  {}: skipped", group.name),
                }
            }
        }

        if self.files_failed > 0 {
            println!();
            println!("{}", style("❌ Errors:").red().bold());
            for op in self.failures() {
                println!(
                    "  {}: {}",
                    op.path.display(),
                    op.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
}

/// Directory name for a group: sanitized camera model plus a short hash prefix
pub fn group_dir_name(identifier: &DuplicateIdentifier) -> String {
    let model = sanitize_component(&identifier.camera_model);
    let model = if model.is_empty() {
        "unknown_camera".to_string()
    } else {
        model
    };

    let prefix: String = identifier
        .content_hash
        .chars()
        .take(HASH_PREFIX_LEN)
        .collect();
    let prefix = sanitize_component(&prefix);
    let prefix = if prefix.is_empty() {
        "nohash".to_string()
    } else {
        prefix
    };

    format!("{}_{}", model, prefix)
}

/// Delete or move every non-kept member of each duplicate group.
///
/// The destination directory is created before anything else; failing to
/// create it aborts the whole batch. Failures on individual files are
/// logged and recorded without stopping the batch.
pub fn execute_actions(
    scan_result: &DedupResult,
    plan: &ActionPlan,
    prompter: &mut dyn Prompter,
) -> Result<ActionResult, DedupError> {
    let mut result = ActionResult::new();
    if scan_result.duplicates.is_empty() {
        return Ok(result);
    }

    if let Some(destination) = &plan.destination {
        if !plan.dry_run {
            fs::create_dir_all(destination).map_err(|source| {
                error!(
                    "Cannot create destination directory {}: {}",
                    destination.display(),
                    source
                );
                DedupError::DestinationUnavailable {
                    path: destination.clone(),
                    source,
                }
            })?;
        }
    }

    info!(
        "Found {} groups with {} total duplicate files.",
        scan_result.duplicates.len(),
        scan_result.get_duplicate_count()
    );

    let verb = if plan.destination.is_some() { "move" } else { "remove" };

    if plan.confirm == Confirmation::Once
        && !prompter.confirm(&format!("Do you want to {} duplicated files?", verb))?
    {
        println!("{}", style("Operation cancelled").yellow());
        result.cancelled = true;
        return Ok(result);
    }

    for (number, (identifier, records)) in scan_result.sorted_groups().into_iter().enumerate() {
        let name = group_dir_name(identifier);
        print_group(number + 1, identifier, records, None);

        if plan.confirm == Confirmation::PerGroup
            && !prompter.confirm("Process this duplicate group?")?
        {
            println!("  Skipping this group.");
            result.groups.push(GroupSummary {
                name,
                kept: None,
                files_processed: 0,
                space_saved: 0,
            });
            continue;
        }

        let keep_idx = choose_keeper(records, plan.keep, prompter)?;
        println!("  📄 Keeping: {}", records[keep_idx].path.display());

        let group_dir = plan.destination.as_ref().map(|dest| dest.join(&name));
        let mut summary = GroupSummary {
            name,
            kept: Some(records[keep_idx].path.clone()),
            files_processed: 0,
            space_saved: 0,
        };

        for (idx, record) in records.iter().enumerate() {
            if idx == keep_idx {
                continue;
            }

            let operation = match &group_dir {
                Some(dir) => move_file(record, dir, plan.dry_run),
                None => delete_file(record, plan.dry_run),
            };

            result.record(&mut summary, operation);
        }

        result.groups.push(summary);
    }

    Ok(result)
}

fn choose_keeper(
    records: &[ImageRecord],
    policy: KeepPolicy,
    prompter: &mut dyn Prompter,
) -> Result<usize, DedupError> {
    let suggested = suggest_best_file(records);

    match policy {
        KeepPolicy::AutoBest => {
            println!(
                "  Automatically selected to keep file #{} (best resolution/quality)",
                suggested + 1
            );
            Ok(suggested)
        }
        KeepPolicy::Manual => match prompter.choose_keeper(records, suggested)? {
            Some(idx) if idx < records.len() => Ok(idx),
            _ => {
                warn!("Invalid selection. Keeping file #1.");
                Ok(0)
            }
        },
    }
}

/// Delete a file after checking its directory allows it
fn delete_file(record: &ImageRecord, dry_run: bool) -> FileOperation {
    let path = &record.path;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    if !is_dir_writable(parent) {
        warn!("No permission to remove: {}", path.display());
        return FileOperation::failed(
            path,
            OperationKind::Delete,
            format!("no write permission on {}", parent.display()),
        );
    }

    if dry_run {
        println!("  Would delete: {}", path.display());
        return FileOperation::succeeded(path, OperationKind::Delete, record.file_size);
    }

    match fs::remove_file(path) {
        Ok(()) => {
            println!("  ✅ Removed: {}", path.display());
            info!("Removed {}", path.display());
            FileOperation::succeeded(path, OperationKind::Delete, record.file_size)
        }
        Err(e) => {
            error!("Error removing {}: {}", path.display(), e);
            FileOperation::failed(path, OperationKind::Delete, format!("Failed to delete: {}", e))
        }
    }
}

/// Move a file into `group_dir`, renaming on collision
fn move_file(record: &ImageRecord, group_dir: &Path, dry_run: bool) -> FileOperation {
    let source = &record.path;

    let Some(file_name) = source.file_name() else {
        return FileOperation::failed(
            source,
            OperationKind::Move {
                target: group_dir.to_path_buf(),
            },
            "path has no file name".to_string(),
        );
    };

    if !dry_run {
        if let Err(e) = fs::create_dir_all(group_dir) {
            error!("Failed to create {}: {}", group_dir.display(), e);
            return FileOperation::failed(
                source,
                OperationKind::Move {
                    target: group_dir.to_path_buf(),
                },
                format!("Failed to create {}: {}", group_dir.display(), e),
            );
        }
    }

    let target = unique_target(group_dir, file_name);
    let kind = OperationKind::Move {
        target: target.clone(),
    };

    if dry_run {
        println!("  Would move: {} -> {}", source.display(), target.display());
        return FileOperation::succeeded(source, kind, record.file_size);
    }

    match relocate(source, &target) {
        Ok(()) => {
            println!("  ✅ Moved: {} -> {}", source.display(), target.display());
            info!("Moved {} -> {}", source.display(), target.display());
            FileOperation::succeeded(source, kind, record.file_size)
        }
        Err(e) => {
            error!("Error moving {}: {}", source.display(), e);
            FileOperation::failed(source, kind, format!("Failed to move: {}", e))
        }
    }
}

/// Rename, falling back to copy + delete across filesystems.
///
/// On failure the source stays in place and no partial target is left behind.
fn relocate(source: &Path, target: &Path) -> io::Result<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }

    let moved = fs::copy(source, target).and_then(|_| fs::remove_file(source));
    if let Err(e) = moved {
        discard_partial(target);
        return Err(e);
    }
    Ok(())
}

fn discard_partial(target: &Path) {
    match fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial copy {}: {}", target.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use tempfile::tempdir;

    fn write_record(dir: &Path, name: &str, content: &[u8], resolution: (u32, u32)) -> ImageRecord {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        ImageRecord {
            path,
            file_size: content.len() as u64,
            content_hash: Some("0f0ff9f5f694e994374b37ee7cc92f5bc19292f8".to_string()),
            camera_model: Some("ILCE-7M3".to_string()),
            resolution: Some(resolution),
        }
    }

    fn single_group(records: Vec<ImageRecord>) -> DedupResult {
        let mut result = DedupResult::new();
        for record in records {
            result.duplicates.entry(record.identifier()).or_default().push(record);
        }
        result
    }

    fn auto_plan(action: DedupAction) -> ActionPlan {
        ActionPlan::for_action(&action)
            .unwrap()
            .with_keep(KeepPolicy::AutoBest)
    }

    #[test]
    fn test_group_dir_name() {
        let id = DuplicateIdentifier {
            camera_model: "Canon EOS R5".to_string(),
            content_hash: "0f0ff9f5f694e994".to_string(),
            resolution: (1, 1),
            file_size: 1,
        };
        assert_eq!(group_dir_name(&id), "Canon_EOS_R5_0f0ff9f5");

        let bare = DuplicateIdentifier {
            camera_model: String::new(),
            content_hash: String::new(),
            resolution: (0, 0),
            file_size: 0,
        };
        assert_eq!(group_dir_name(&bare), "unknown_camera_nohash");
    }

    #[test]
    fn test_list_has_no_plan() {
        assert!(ActionPlan::for_action(&DedupAction::List).is_none());
    }

    #[test]
    fn test_delete_keeps_first_on_tie() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.jpg", b"same", (10, 10));
        let b = write_record(dir.path(), "b.jpg", b"same", (10, 10));
        let scan = single_group(vec![a.clone(), b.clone()]);

        let mut prompter = ScriptedPrompter::new().confirm_with([true]);
        let result = execute_actions(&scan, &auto_plan(DedupAction::Delete), &mut prompter).unwrap();

        assert!(a.path.exists());
        assert!(!b.path.exists());
        assert_eq!(result.files_done, 1);
        assert_eq!(result.bytes_reclaimed, 4);
        assert_eq!(result.groups[0].kept.as_deref(), Some(a.path.as_path()));
    }

    #[test]
    fn test_declined_confirmation_touches_nothing() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.jpg", b"same", (10, 10));
        let b = write_record(dir.path(), "b.jpg", b"same", (10, 10));
        let scan = single_group(vec![a.clone(), b.clone()]);

        let mut prompter = ScriptedPrompter::new().confirm_with([false]);
        let result = execute_actions(&scan, &auto_plan(DedupAction::Delete), &mut prompter).unwrap();

        assert!(result.cancelled);
        assert!(a.path.exists() && b.path.exists());
        assert!(result.operations.is_empty());
    }

    #[test]
    fn test_per_group_skip() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.jpg", b"same", (10, 10));
        let b = write_record(dir.path(), "b.jpg", b"same", (10, 10));
        let scan = single_group(vec![a.clone(), b.clone()]);
        let plan = auto_plan(DedupAction::Delete).with_confirmation(Confirmation::PerGroup);

        let mut prompter = ScriptedPrompter::new().confirm_with([false]);
        let result = execute_actions(&scan, &plan, &mut prompter).unwrap();

        assert!(!result.cancelled);
        assert!(b.path.exists());
        assert_eq!(result.groups.len(), 1);
        assert!(result.groups[0].kept.is_none());
        assert_eq!(prompter.asked, vec!["Process this duplicate group?".to_string()]);
    }

    #[test]
    fn test_manual_choice_and_invalid_fallback() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.jpg", b"same", (10, 10));
        let b = write_record(dir.path(), "b.jpg", b"same", (10, 10));
        let scan = single_group(vec![a.clone(), b.clone()]);
        let plan = ActionPlan::for_action(&DedupAction::Delete).unwrap();

        let mut prompter = ScriptedPrompter::new()
            .confirm_with([true])
            .keep_with([Some(1)]);
        execute_actions(&scan, &plan, &mut prompter).unwrap();
        assert!(!a.path.exists());
        assert!(b.path.exists());

        let c = write_record(dir.path(), "c.jpg", b"other", (10, 10));
        let d = write_record(dir.path(), "d.jpg", b"other", (10, 10));
        let scan = single_group(vec![c.clone(), d.clone()]);
        let mut prompter = ScriptedPrompter::new()
            .confirm_with([true])
            .keep_with([Some(7)]);
        execute_actions(&scan, &plan, &mut prompter).unwrap();
        assert!(c.path.exists());
        assert!(!d.path.exists());
    }

    #[test]
    fn test_move_into_group_dir_with_collision_suffix() {
        let src = tempdir().unwrap();
        let nested = src.path().join("nested");
        fs::create_dir(&nested).unwrap();
        let dest = tempdir().unwrap();

        let keeper = write_record(src.path(), "DSC0001.ARW", b"raw", (6000, 4000));
        let extra = write_record(&nested, "DSC0001.ARW", b"raw", (6000, 4000));
        let scan = single_group(vec![keeper.clone(), extra.clone()]);

        let group_dir = dest.path().join("ILCE-7M3_0f0ff9f5");
        fs::create_dir_all(&group_dir).unwrap();
        fs::write(group_dir.join("DSC0001.ARW"), b"earlier").unwrap();

        let plan = auto_plan(DedupAction::Move(dest.path().to_path_buf()));
        let mut prompter = ScriptedPrompter::new().confirm_with([true]);
        let result = execute_actions(&scan, &plan, &mut prompter).unwrap();

        assert!(keeper.path.exists());
        assert!(!extra.path.exists());
        let moved = group_dir.join("DSC0001_1.ARW");
        assert_eq!(fs::read(&moved).unwrap(), b"raw");
        assert_eq!(
            result.operations[0].kind,
            OperationKind::Move { target: moved }
        );
    }

    #[test]
    fn test_uncreatable_destination_aborts_batch() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.jpg", b"same", (10, 10));
        let b = write_record(dir.path(), "b.jpg", b"same", (10, 10));
        let scan = single_group(vec![a.clone(), b.clone()]);

        // A regular file where a directory is needed
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let plan = auto_plan(DedupAction::Move(blocker.join("dest")));

        let mut prompter = ScriptedPrompter::new().confirm_with([true]);
        let result = execute_actions(&scan, &plan, &mut prompter);

        assert!(matches!(result, Err(DedupError::DestinationUnavailable { .. })));
        assert!(prompter.asked.is_empty());
        assert!(a.path.exists() && b.path.exists());
    }

    #[test]
    fn test_missing_file_fails_without_stopping_group() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.jpg", b"same", (10, 10));
        let b = write_record(dir.path(), "b.jpg", b"same", (10, 10));
        let c = write_record(dir.path(), "c.jpg", b"same", (10, 10));
        fs::remove_file(&b.path).unwrap();
        let scan = single_group(vec![a.clone(), b, c.clone()]);

        let mut prompter = ScriptedPrompter::new().confirm_with([true]);
        let result = execute_actions(&scan, &auto_plan(DedupAction::Delete), &mut prompter).unwrap();

        assert_eq!(result.files_failed, 1);
        assert_eq!(result.files_done, 1);
        assert!(a.path.exists());
        assert!(!c.path.exists());
        assert_eq!(result.groups[0].files_processed, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_directory_is_skipped_and_siblings_continue() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();

        let a = write_record(dir.path(), "a.jpg", b"same", (10, 10));
        let b = write_record(&locked, "b.jpg", b"same", (10, 10));
        let c = write_record(dir.path(), "c.jpg", b"same", (10, 10));
        let scan = single_group(vec![a.clone(), b.clone(), c.clone()]);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        if is_dir_writable(&locked) {
            // mode bits do not apply to root
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let mut prompter = ScriptedPrompter::new().confirm_with([true]);
        let result = execute_actions(&scan, &auto_plan(DedupAction::Delete), &mut prompter).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(a.path.exists());
        assert!(b.path.exists());
        assert!(!c.path.exists());
        assert_eq!(result.files_failed, 1);
        assert_eq!(result.files_done, 1);
        let failure = result.failures().next().unwrap();
        assert_eq!(failure.path, b.path);
        assert!(failure.error.as_deref().unwrap().contains("no write permission"));
    }

    #[test]
    fn test_failed_copy_leaves_no_partial_target() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("missing.ARW");
        let target = dir.path().join("dest.ARW");

        assert!(relocate(&source, &target).is_err());
        assert!(!target.exists());
    }

    #[test]
    fn test_discard_partial_removes_leftover() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("half.ARW");
        fs::write(&target, b"trunc").unwrap();

        discard_partial(&target);
        assert!(!target.exists());
        // already gone is fine
        discard_partial(&target);
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let dir = tempdir().unwrap();
        let a = write_record(dir.path(), "a.jpg", b"same", (10, 10));
        let b = write_record(dir.path(), "b.jpg", b"same", (10, 10));
        let scan = single_group(vec![a.clone(), b.clone()]);
        let dest = dir.path().join("dupes");

        let plan = auto_plan(DedupAction::Move(dest.clone())).with_dry_run(true);
        let mut prompter = ScriptedPrompter::new().confirm_with([true]);
        let result = execute_actions(&scan, &plan, &mut prompter).unwrap();

        assert_eq!(result.files_done, 1);
        assert!(a.path.exists() && b.path.exists());
        assert!(!dest.exists());
    }
}
