use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::{debug, info, warn};

use crate::error::ToolError;

const DEFAULT_PROGRAM: &str = "exiftool";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A single metadata field the tool can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolField {
    CameraModel,
    /// Width and height, either as `WxH` or as two lines
    Dimensions,
}

/// Client for an external metadata extraction tool.
///
/// The scanner only ever talks to the tool through this trait, so tests can
/// substitute a scripted implementation.
pub trait MetadataTool: Send + Sync {
    /// Name of the program, used in log lines and errors
    fn name(&self) -> &str;

    /// Check that the tool can be run. Returns its version string.
    fn probe(&self) -> Option<String>;

    /// Run the tool for one file and return the trimmed value of `field`
    fn read_field(&self, path: &Path, field: ToolField) -> Result<String, ToolError>;
}

/// ExifTool invoked as a subprocess
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: String,
    probe_timeout: Duration,
    query_timeout: Duration,
}

impl ExifTool {
    pub fn new() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            probe_timeout: PROBE_TIMEOUT,
            query_timeout: QUERY_TIMEOUT,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    fn field_args(field: ToolField) -> &'static [&'static str] {
        match field {
            ToolField::CameraModel => &["-Model", "-s3"],
            ToolField::Dimensions => &["-ImageWidth", "-ImageHeight", "-s3", "-sep", "x"],
        }
    }
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataTool for ExifTool {
    fn name(&self) -> &str {
        &self.program
    }

    fn probe(&self) -> Option<String> {
        match run_with_timeout(&self.program, vec!["-ver".into()], self.probe_timeout) {
            Ok(version) => {
                info!("{} version: {}", self.program, version);
                Some(version)
            }
            Err(e) => {
                warn!("{} not found or not usable: {}", self.program, e);
                None
            }
        }
    }

    fn read_field(&self, path: &Path, field: ToolField) -> Result<String, ToolError> {
        let mut args: Vec<OsString> = Self::field_args(field)
            .iter()
            .map(|arg| OsString::from(*arg))
            .collect();
        args.push(path.as_os_str().to_owned());

        debug!("running {} {:?} on {}", self.program, field, path.display());
        run_with_timeout(&self.program, args, self.query_timeout)
    }
}

/// Run `program` with `args`, killing it once `timeout` elapses.
///
/// Returns trimmed stdout on a zero exit status with non-empty output.
pub fn run_with_timeout(
    program: &str,
    args: Vec<OsString>,
    timeout: Duration,
) -> Result<String, ToolError> {
    let mut child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    // Drain stdout on a separate thread so a chatty child can't block on a full pipe.
    // A backgrounded grandchild can hold the pipe open after the child exits,
    // so the result is awaited with the same deadline as the process.
    let (sender, receiver) = bounded(1);
    let stdout = child.stdout.take();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let read = match stdout {
            Some(mut stdout) => stdout.read_to_end(&mut buffer).map(|_| buffer),
            None => Ok(buffer),
        };
        let _ = sender.send(read);
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Timeout {
                    program: program.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                return Err(ToolError::Io {
                    program: program.to_string(),
                    source,
                })
            }
        }
    };

    if !status.success() {
        return Err(ToolError::ExitStatus {
            program: program.to_string(),
            code: status.code(),
        });
    }

    let bytes = match receiver.recv_deadline(deadline) {
        Ok(read) => read.map_err(|source| ToolError::Io {
            program: program.to_string(),
            source,
        })?,
        Err(RecvTimeoutError::Timeout) => {
            warn!("{} exited but its output stayed open past {:?}", program, timeout);
            return Err(ToolError::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
        Err(RecvTimeoutError::Disconnected) => Vec::new(),
    };

    let output = String::from_utf8_lossy(&bytes).trim().to_string();
    if output.is_empty() {
        return Err(ToolError::EmptyOutput {
            program: program.to_string(),
        });
    }

    Ok(output)
}
