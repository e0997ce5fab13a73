//! Process execution seam for the build tool
//!
//! - ToolRunner trait: run one external command to completion
//! - ProcessRunner: spawns the real process, streaming its output to the log
//! - RecordingRunner: scripted in-process runner for tests

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::info;

use super::OUTPUT_TAIL_LINES;

/// One external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory (inherits the current one when None)
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
        }
    }

    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, None when terminated by a signal
    pub code: Option<i32>,
    pub success: bool,
    /// Last lines of combined stdout and stderr; stderr lines carry a `[stderr] ` prefix
    pub output: Vec<String>,
}

impl ToolOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            success: true,
            output: Vec::new(),
        }
    }

    pub fn failure(code: i32, output: Vec<String>) -> Self {
        Self {
            code: Some(code),
            success: false,
            output,
        }
    }
}

/// Runs an external command to completion.
///
/// Implementations block until the process exits and must not interpret the
/// exit status; the caller decides what a failure means.
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> io::Result<ToolOutput>;
}

/// Spawns real processes. Every output line is logged; only the last
/// `tail_lines` are kept.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    tail_lines: usize,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            tail_lines: OUTPUT_TAIL_LINES,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tail_lines(mut self, lines: usize) -> Self {
        self.tail_lines = lines;
        self
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ToolOutput> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref cwd) = invocation.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn()?;

        let tail = Arc::new(Mutex::new(TailBuffer::new(self.tail_lines)));
        let stdout_handle = child
            .stdout
            .take()
            .map(|stdout| drain_lines(stdout, "", Arc::clone(&tail)));
        let stderr_handle = child
            .stderr
            .take()
            .map(|stderr| drain_lines(stderr, "[stderr] ", Arc::clone(&tail)));

        let status = child.wait()?;

        if let Some(handle) = stdout_handle {
            let _ = handle.join();
        }
        if let Some(handle) = stderr_handle {
            let _ = handle.join();
        }

        let output = match tail.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        Ok(ToolOutput {
            code: status.code(),
            success: status.success(),
            output,
        })
    }
}

/// Fixed-capacity ring of the most recent lines
#[derive(Debug)]
struct TailBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl TailBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines).into()
    }
}

/// Read a pipe line by line on its own thread, logging each line and
/// keeping the tail
fn drain_lines<R: Read + Send + 'static>(
    pipe: R,
    prefix: &'static str,
    sink: Arc<Mutex<TailBuffer>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines().map_while(Result::ok) {
            info!(target: "build_tool", "{}{}", prefix, line);
            if let Ok(mut tail) = sink.lock() {
                tail.push(format!("{}{}", prefix, line));
            }
        }
    })
}

/// A scripted response for [`RecordingRunner`]
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    pub output: ToolOutput,
    /// Files to write before returning, simulating what the build produces
    pub files: Vec<(PathBuf, Vec<u8>)>,
}

impl ScriptedStep {
    pub fn success() -> Self {
        Self {
            output: ToolOutput::success(),
            files: Vec::new(),
        }
    }

    pub fn failure(code: i32, output: &[&str]) -> Self {
        Self {
            output: ToolOutput::failure(code, output.iter().map(|s| s.to_string()).collect()),
            files: Vec::new(),
        }
    }

    pub fn producing(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.into(), contents.into()));
        self
    }
}

/// Records invocations and answers from a script; succeeds once the script runs out
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    script: Mutex<VecDeque<ScriptedStep>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response to the next unanswered invocation
    pub fn push(&self, step: ScriptedStep) -> &Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
        self
    }

    /// Everything run so far, in order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ToolOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }

        let step = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(ScriptedStep::success);

        for (path, contents) in &step.files {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)?;
        }

        Ok(step.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display_quotes_spaces() {
        let inv = Invocation::new(
            "cmake",
            vec!["-B".to_string(), "dist/my game/build".to_string()],
        );
        assert_eq!(inv.to_string(), "cmake -B \"dist/my game/build\"");
    }

    #[test]
    fn test_recording_runner_follows_script() {
        let runner = RecordingRunner::new();
        runner.push(ScriptedStep::failure(2, &["boom"]));

        let first = runner.run(&Invocation::new("a", vec![])).unwrap();
        let second = runner.run(&Invocation::new("b", vec![])).unwrap();

        assert!(!first.success);
        assert_eq!(first.code, Some(2));
        assert_eq!(first.output, vec!["boom".to_string()]);
        assert!(second.success);

        let programs: Vec<_> = runner.calls().into_iter().map(|c| c.program).collect();
        assert_eq!(programs, vec!["a", "b"]);
    }

    #[test]
    fn test_recording_runner_writes_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let exe = dir.path().join("Release/app.exe");

        let runner = RecordingRunner::new();
        runner.push(ScriptedStep::success().producing(&exe, "MZ"));
        runner.run(&Invocation::new("cmake", vec![])).unwrap();

        assert_eq!(fs::read(&exe).unwrap(), b"MZ");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_captures_output_and_status() {
        let inv = Invocation::new(
            "sh",
            vec!["-c".to_string(), "echo out; echo err 1>&2; exit 3".to_string()],
        );
        let result = ProcessRunner::new().run(&inv).unwrap();

        assert!(!result.success);
        assert_eq!(result.code, Some(3));
        assert!(result.output.contains(&"out".to_string()));
        assert!(result.output.contains(&"[stderr] err".to_string()));
    }

    #[test]
    fn test_tail_buffer_keeps_last_lines() {
        let mut tail = TailBuffer::new(3);
        for i in 0..10 {
            tail.push(format!("line {}", i));
        }
        assert_eq!(tail.take(), vec!["line 7", "line 8", "line 9"]);
        assert!(tail.take().is_empty());

        let mut none = TailBuffer::new(0);
        none.push("dropped".to_string());
        assert!(none.take().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_bounds_captured_output() {
        let inv = Invocation::new(
            "sh",
            vec![
                "-c".to_string(),
                "i=0; while [ $i -lt 500 ]; do echo line $i; i=$((i+1)); done".to_string(),
            ],
        );
        let result = ProcessRunner::new().with_tail_lines(5).run(&inv).unwrap();

        assert!(result.success);
        assert_eq!(result.output.len(), 5);
        assert_eq!(result.output.last().unwrap(), "line 499");
    }

    #[test]
    fn test_process_runner_spawn_failure() {
        let inv = Invocation::new("definitely-not-a-real-build-tool-xyz", vec![]);
        assert!(ProcessRunner::new().run(&inv).is_err());
    }
}
