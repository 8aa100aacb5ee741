//! tool::session
//!
//! A long-lived interactive tool subprocess.
//!
//! # Architecture
//!
//! Two background threads run for the whole life of the session:
//! - the stdout reader feeds a [`PromptFramer`] and sends every completed
//!   response over a channel
//! - the stderr drain turns each line into a `warn` event and never touches
//!   synchronization
//!
//! The caller writes a command and blocks on the channel. Both threads log
//! through the `tracing` dispatcher that was current when the session was
//! spawned, so a subscriber scoped around the caller also sees their events.
//!
//! # Lifecycle
//!
//! [`ToolSession::spawn`] waits for the first prompt. Dropping the session
//! (or calling [`ToolSession::close`]) sends `quit`, closes stdin, joins both
//! threads and reaps the child.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use uuid::Uuid;

use super::parse::{self, DirEntryTarget, ObjectInfo, VersionInfo};
use super::protocol::{command, PromptFramer};
use super::{ToolError, VersionTool};
use crate::core::types::{canonical_element_name, ElementVersionPath, VersionPath};

/// How to start the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub program: String,
    pub args: Vec<String>,
    pub prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: crate::core::config::DEFAULT_PROGRAM.to_string(),
            args: Vec::new(),
            prompt: crate::core::config::DEFAULT_PROMPT.to_string(),
        }
    }
}

/// Pseudo command name used when the tool dies before its first prompt.
const STARTUP: &str = "<startup>";

/// Interactive session with the tool.
///
/// Not reentrant: `execute` takes `&mut self`, so one command is in flight
/// at a time. Share a session between threads behind a `Mutex`.
pub struct ToolSession {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    responses: Receiver<Vec<String>>,
    stdout_thread: Option<JoinHandle<()>>,
    stderr_thread: Option<JoinHandle<()>>,
    closed: bool,
}

impl std::fmt::Debug for ToolSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSession")
            .field("program", &self.program)
            .field("pid", &self.child.id())
            .field("closed", &self.closed)
            .finish()
    }
}

impl ToolSession {
    /// Start the tool and wait for its first prompt.
    ///
    /// Blocks for as long as the tool takes to print the prompt.
    pub fn spawn(config: &SessionConfig) -> Result<Self, ToolError> {
        let framer = PromptFramer::new(&config.prompt)?;

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("tool stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("tool stderr was not captured"))?;

        let dispatch = tracing::dispatcher::get_default(|current| current.clone());
        let (sender, responses) = mpsc::channel();

        let stdout_dispatch = dispatch.clone();
        let stdout_thread = thread::Builder::new()
            .name("tool-stdout".to_string())
            .spawn(move || {
                tracing::dispatcher::with_default(&stdout_dispatch, || {
                    read_responses(stdout, framer, sender)
                })
            })?;
        let stderr_thread = thread::Builder::new()
            .name("tool-stderr".to_string())
            .spawn(move || tracing::dispatcher::with_default(&dispatch, || drain_errors(stderr)))?;

        let mut session = Self {
            program: config.program.clone(),
            child,
            stdin,
            responses,
            stdout_thread: Some(stdout_thread),
            stderr_thread: Some(stderr_thread),
            closed: false,
        };

        let banner = session
            .responses
            .recv()
            .map_err(|_| ToolError::Terminated {
                command: STARTUP.to_string(),
            })?;
        if !banner.is_empty() {
            tracing::debug!(lines = ?banner, "tool banner");
        }
        tracing::debug!(program = %session.program, pid = session.child.id(), "tool session ready");
        Ok(session)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Send one command and collect its response lines.
    pub fn execute(&mut self, command: &str) -> Result<Vec<String>, ToolError> {
        // anything already queued was not asked for by this command
        while let Ok(stale) = self.responses.try_recv() {
            tracing::debug!(lines = ?stale, "discarding unsolicited tool output");
        }

        let terminated = || ToolError::Terminated {
            command: command.to_string(),
        };
        let stdin = self.stdin.as_mut().ok_or_else(terminated)?;

        tracing::trace!(command, "tool command start");
        let written = writeln!(stdin, "{command}").and_then(|()| stdin.flush());
        match written {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Err(terminated()),
            Err(e) => return Err(e.into()),
        }

        let lines = self.responses.recv().map_err(|_| terminated())?;
        tracing::trace!(command, lines = lines.len(), "tool command done");
        Ok(lines)
    }

    /// Quit the tool and wait for it to exit.
    pub fn close(mut self) -> Result<(), ToolError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), ToolError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mut stdin) = self.stdin.take() {
            // the tool may already be gone; closing stdin is what matters
            let _ = writeln!(stdin, "{}", command::quit()).and_then(|()| stdin.flush());
        }
        for handle in [self.stdout_thread.take(), self.stderr_thread.take()]
            .into_iter()
            .flatten()
        {
            if handle.join().is_err() {
                tracing::warn!(program = %self.program, "tool reader thread panicked");
            }
        }
        let status = self.child.wait()?;
        tracing::debug!(program = %self.program, %status, "tool session closed");
        Ok(())
    }

    fn query<T>(
        &mut self,
        command: String,
        parse: impl FnOnce(&[String]) -> Result<T, parse::Malformed>,
    ) -> Result<T, ToolError> {
        let lines = self.execute(&command)?;
        parse(&lines).map_err(|e| ToolError::malformed(&command, e))
    }
}

impl Drop for ToolSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(program = %self.program, error = %e, "failed to close tool session");
        }
    }
}

fn read_responses(mut stdout: impl Read, mut framer: PromptFramer, sender: Sender<Vec<String>>) {
    let mut buffer = [0u8; 8192];
    loop {
        match stdout.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                for response in framer.push_bytes(&buffer[..n]) {
                    if sender.send(response).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "reading tool output failed");
                break;
            }
        }
    }
    if !framer.partial().is_empty() {
        tracing::debug!(lines = ?framer.partial(), "tool output ended without a prompt");
    }
}

fn drain_errors(stderr: impl Read) {
    for line in BufReader::new(stderr).lines() {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => tracing::warn!(target: "vobgraph::tool::stderr", "{line}"),
            Err(e) => {
                tracing::debug!(error = %e, "tool stderr closed");
                break;
            }
        }
    }
}

impl VersionTool for ToolSession {
    fn change_directory(&mut self, path: &str) -> Result<(), ToolError> {
        let lines = self.execute(&command::cd(path))?;
        if !lines.is_empty() {
            tracing::debug!(path, output = ?lines, "cd printed output");
        }
        Ok(())
    }

    fn working_directory(&mut self) -> Result<String, ToolError> {
        self.query(command::pwd(), |lines| {
            lines
                .first()
                .cloned()
                .ok_or_else(|| parse::Malformed("no working directory printed".to_string()))
        })
    }

    fn version_tree(&mut self, element: &str) -> Result<Vec<String>, ToolError> {
        let lines = self.execute(&command::version_tree(element))?;
        Ok(parse::version_tree(&lines))
    }

    fn list_directory(
        &mut self,
        version: &ElementVersionPath,
    ) -> Result<BTreeMap<String, DirEntryTarget>, ToolError> {
        let lines = self.execute(&command::list_directory(&version.to_string()))?;
        Ok(parse::directory_dump(&lines))
    }

    fn object_id(&mut self, element: &str) -> Result<Option<ObjectInfo>, ToolError> {
        let extended = format!("{}@@", canonical_element_name(element));
        self.query(command::object_id(&extended), parse::object_info)
    }

    fn predecessor(
        &mut self,
        version: &ElementVersionPath,
    ) -> Result<Option<VersionPath>, ToolError> {
        self.query(command::predecessor(&version.to_string()), parse::predecessor)
    }

    fn version_metadata(&mut self, version: &ElementVersionPath) -> Result<VersionInfo, ToolError> {
        self.query(
            command::version_metadata(&version.to_string()),
            parse::version_metadata,
        )
    }

    fn materialize_content(&mut self, version: &ElementVersionPath) -> Result<PathBuf, ToolError> {
        let path = std::env::temp_dir().join(format!("vobgraph-{}", Uuid::new_v4()));
        let lines = self.execute(&command::get(&path.to_string_lossy(), &version.to_string()))?;
        if !path.exists() {
            tracing::warn!(version = %version, output = ?lines, "get produced no file");
            return Err(ToolError::ContentUnavailable {
                version: version.to_string(),
                path,
            });
        }
        Ok(path)
    }
}
