//! Running external engine binaries with an optional deadline.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::ToolError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Convert a seconds setting into an optional timeout (0 disables it).
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Run `command` to completion and return its output if it exited successfully.
///
/// With a timeout, the child is killed once the deadline passes and
/// [`ToolError::TimedOut`] is returned.
pub fn run_tool(
    tool: &'static str,
    command: &mut Command,
    timeout: Option<Duration>,
) -> Result<Output, ToolError> {
    let program = Path::new(command.get_program()).to_path_buf();
    trace!("Running {:?}", command);

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ToolError::Unavailable {
            tool,
            path: program,
            source,
        })?;

    let output = match timeout {
        None => child
            .wait_with_output()
            .map_err(|source| ToolError::Io { tool, source })?,
        Some(timeout) => wait_with_deadline(tool, child, timeout)?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ToolError::Failed {
            tool,
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    debug!("{} finished ({} bytes of output)", tool, output.stdout.len());
    Ok(output)
}

/// Check whether a binary can be started with `--version`.
pub fn is_available(binary: &Path) -> bool {
    Command::new(binary)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn wait_with_deadline(
    tool: &'static str,
    mut child: Child,
    timeout: Duration,
) -> Result<Output, ToolError> {
    // Drain both pipes while polling so a chatty child cannot block on a full pipe.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let deadline = Instant::now() + timeout;

    let status = loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|source| ToolError::Io { tool, source })?
        {
            break status;
        }
        if Instant::now() >= deadline {
            warn!("{} exceeded {:?}, killing it", tool, timeout);
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::TimedOut { tool, timeout });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: collect(tool, stdout)?,
        stderr: collect(tool, stderr)?,
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

/// Join a drain thread; a failed read means the captured output is incomplete.
fn collect(
    tool: &'static str,
    handle: JoinHandle<io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, ToolError> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("pipe reader panicked")))
        .map_err(|source| ToolError::Io { tool, source })
}
