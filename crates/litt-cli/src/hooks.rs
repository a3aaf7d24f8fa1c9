//! Runs executable hook scripts from `hooks/<event>/` in the data directory.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, ExitStatus, Stdio};
use std::thread;

use litt_core::{HookDispatcher, HookEvent};
use serde_json::Value;
use thiserror::Error;

use crate::Config;

/// Hook failures. Any of these aborts the command.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to list hooks in {path}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to run {event} hook {path}")]
    Spawn {
        event: HookEvent,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{event} hook {path} failed with {status}")]
    Failed {
        event: HookEvent,
        path: PathBuf,
        status: ExitStatus,
    },
    #[error("failed to encode hook payload")]
    Encode(#[source] serde_json::Error),
}

/// Dispatches events to the executables under `<hooks dir>/<event>/`.
///
/// Each executable runs in name order with the event name as its only
/// argument, the payload as JSON on stdin and the data directory as working
/// directory. The first non-zero exit stops dispatch.
#[derive(Debug, Clone)]
pub struct ScriptHooks {
    hooks_dir: PathBuf,
    working_dir: PathBuf,
}

impl ScriptHooks {
    pub fn new(config: &Config) -> Self {
        Self {
            hooks_dir: config.hooks_dir(),
            working_dir: config.data_dir.clone(),
        }
    }

    /// Executable regular files registered for `event`, sorted by name.
    pub fn scripts(&self, event: HookEvent) -> Result<Vec<PathBuf>, HookError> {
        let dir = self.hooks_dir.join(event.as_str());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(HookError::List { path: dir, source }),
        };

        let mut scripts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| HookError::List {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if is_executable(&path) {
                scripts.push(path);
            }
        }
        scripts.sort();
        Ok(scripts)
    }

    fn run(&self, event: HookEvent, script: &Path, payload: &[u8]) -> Result<(), HookError> {
        let spawn_err = |source| HookError::Spawn {
            event,
            path: script.to_path_buf(),
            source,
        };

        let mut child = Command::new(script)
            .arg(event.as_str())
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_err)?;

        // Stdin is fed from its own thread while stdout is drained.
        let stdin = child.stdin.take();
        let (fed, output) = thread::scope(|scope| {
            let feeder = scope.spawn(move || feed(stdin, payload));
            let output = child.wait_with_output();
            let fed = feeder.join().unwrap_or_else(|e| std::panic::resume_unwind(e));
            (fed, output)
        });
        let output = output.map_err(spawn_err)?;
        fed.map_err(spawn_err)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(
                %event,
                script = %script.display(),
                output = %stdout.trim_end(),
                "hook output"
            );
        }
        if !output.status.success() {
            return Err(HookError::Failed {
                event,
                path: script.to_path_buf(),
                status: output.status,
            });
        }
        Ok(())
    }
}

impl HookDispatcher for ScriptHooks {
    type Error = HookError;

    fn dispatch(&self, event: HookEvent, payload: &Value) -> Result<(), Self::Error> {
        let scripts = self.scripts(event)?;
        if scripts.is_empty() {
            return Ok(());
        }
        let payload = serde_json::to_vec(payload).map_err(HookError::Encode)?;
        for script in &scripts {
            tracing::debug!(%event, script = %script.display(), "running hook");
            self.run(event, script, &payload)?;
        }
        Ok(())
    }
}

/// Writes the payload and closes stdin.
fn feed(stdin: Option<ChildStdin>, payload: &[u8]) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(payload) {
        // A hook that ignores its input may exit before reading it.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        result => result,
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
