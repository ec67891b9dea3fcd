//! Test utilities for libpwsh integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

use libpwsh::{Error, LineEnding, Pipes, ProcessBackend, Result, Session, SessionConfig};

/// How a reply's bytes reach the two pipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Stdout in one write, then stderr in one write.
    Whole,
    /// Stderr first, then stdout.
    StderrFirst,
    /// Each stream in `n`-byte writes, stdout fully before stderr.
    Chunked(usize),
    /// Single bytes alternating between stdout and stderr.
    Interleaved,
}

/// What the fake interpreter does with one command.
#[derive(Debug, Clone)]
pub struct Reply {
    pub stdout: String,
    pub stderr: String,
    pub delivery: Delivery,
    kind: ReplyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    Normal,
    /// Print a parse error and skip the sentinels.
    ParseError,
    /// Print nothing at all.
    Hang,
    /// Print the reply without sentinels, then exit the process.
    Crash,
}

impl Reply {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            delivery: Delivery::Whole,
            kind: ReplyKind::Normal,
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn delivered(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// PowerShell's output for an unparseable command line.
    pub fn parse_error() -> Self {
        Self {
            stdout: String::new(),
            stderr: "ParserError: Missing closing ')' in expression.\n".to_string(),
            delivery: Delivery::Whole,
            kind: ReplyKind::ParseError,
        }
    }

    pub fn hang() -> Self {
        Self {
            kind: ReplyKind::Hang,
            ..Self::ok("")
        }
    }

    pub fn crash() -> Self {
        Self::crash_after("")
    }

    /// Write `stdout` and then die before the command finishes.
    pub fn crash_after(stdout: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Crash,
            ..Self::ok(stdout)
        }
    }
}

type Handler = Arc<dyn Fn(&str) -> Reply + Send + Sync>;

/// The parts of a framed line the fake interpreter needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    pub command: String,
    pub stdout_sentinel: String,
    pub stderr_sentinel: String,
}

/// Split `<cmd>; echo '<out>'; [Console]::Error.WriteLine('<err>')`.
pub fn parse_frame(line: &str) -> Option<ParsedFrame> {
    let (rest, err) = line.rsplit_once("; [Console]::Error.WriteLine('")?;
    let stderr_sentinel = err.strip_suffix("')")?;
    let (command, out) = rest.rsplit_once("; echo '")?;
    let stdout_sentinel = out.strip_suffix('\'')?;
    Some(ParsedFrame {
        command: command.to_string(),
        stdout_sentinel: stdout_sentinel.to_string(),
        stderr_sentinel: stderr_sentinel.to_string(),
    })
}

/// Everything the fake interpreter has seen, shared with the test.
#[derive(Debug, Default)]
pub struct Transcript {
    pub started: Option<(PathBuf, Vec<String>)>,
    pub lines: Vec<String>,
    pub exited: bool,
    pub killed: bool,
}

/// A backend whose "process" is a task answering framed commands.
///
/// Commands are answered by a handler closure; `exit` ends the task and
/// closes its pipes, like the real interpreter.
pub struct ScriptedBackend {
    handler: Handler,
    transcript: Arc<Mutex<Transcript>>,
    stdin: Option<DuplexStream>,
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
    task: Option<JoinHandle<()>>,
}

impl ScriptedBackend {
    pub fn new(handler: impl Fn(&str) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            transcript: Arc::new(Mutex::new(Transcript::default())),
            stdin: None,
            stdout: None,
            stderr: None,
            task: None,
        }
    }

    /// Shared view of what the interpreter received.
    pub fn transcript(&self) -> Arc<Mutex<Transcript>> {
        Arc::clone(&self.transcript)
    }
}

#[async_trait]
impl ProcessBackend for ScriptedBackend {
    fn look_path(&self, name: &str) -> Option<PathBuf> {
        (name == "pwsh").then(|| PathBuf::from("/usr/bin/pwsh"))
    }

    fn set_env(&mut self, _values: HashMap<String, String>, _combined: bool) {}

    fn set_working_dir(&mut self, _dir: Option<&Path>) {}

    async fn start_process(&mut self, program: &Path, args: &[&str]) -> Result<()> {
        let (stdin, stdin_peer) = tokio::io::duplex(64 * 1024);
        let (stdout, stdout_peer) = tokio::io::duplex(64 * 1024);
        let (stderr, stderr_peer) = tokio::io::duplex(64 * 1024);

        self.transcript.lock().unwrap().started = Some((
            program.to_path_buf(),
            args.iter().map(|a| a.to_string()).collect(),
        ));

        self.task = Some(tokio::spawn(interpreter(
            stdin_peer,
            stdout_peer,
            stderr_peer,
            Arc::clone(&self.handler),
            Arc::clone(&self.transcript),
        )));
        self.stdin = Some(stdin);
        self.stdout = Some(stdout);
        self.stderr = Some(stderr);
        Ok(())
    }

    fn pipes(&mut self) -> Result<Pipes<'_>> {
        match (&mut self.stdin, &mut self.stdout, &mut self.stderr) {
            (Some(stdin), Some(stdout), Some(stderr)) => Ok(Pipes {
                stdin,
                stdout,
                stderr,
            }),
            _ => Err(Error::NotStarted),
        }
    }

    async fn close_stdin(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.shutdown().await?;
        }
        Ok(())
    }

    async fn kill(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.transcript.lock().unwrap().killed = true;
        Ok(())
    }

    async fn wait(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        }
        Ok(())
    }
}

async fn interpreter(
    stdin: DuplexStream,
    mut stdout: DuplexStream,
    mut stderr: DuplexStream,
    handler: Handler,
    transcript: Arc<Mutex<Transcript>>,
) {
    let mut lines = BufReader::new(stdin).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        transcript.lock().unwrap().lines.push(line.clone());
        if line == "exit" {
            break;
        }

        let Some(frame) = parse_frame(&line) else {
            continue;
        };
        let reply = handler(&frame.command);

        match reply.kind {
            ReplyKind::Crash => {
                let _ = stdout.write_all(reply.stdout.as_bytes()).await;
                let _ = stderr.write_all(reply.stderr.as_bytes()).await;
                break;
            }
            ReplyKind::Hang => continue,
            ReplyKind::ParseError => {
                let _ = stderr.write_all(reply.stderr.as_bytes()).await;
                continue;
            }
            ReplyKind::Normal => {}
        }

        let out = format!("{}{}\n", reply.stdout, frame.stdout_sentinel);
        let err = format!("{}{}\n", reply.stderr, frame.stderr_sentinel);
        if deliver(&mut stdout, &mut stderr, out.as_bytes(), err.as_bytes(), reply.delivery)
            .await
            .is_err()
        {
            break;
        }
    }

    transcript.lock().unwrap().exited = true;
}

async fn deliver(
    stdout: &mut DuplexStream,
    stderr: &mut DuplexStream,
    out: &[u8],
    err: &[u8],
    delivery: Delivery,
) -> std::io::Result<()> {
    match delivery {
        Delivery::Whole => {
            stdout.write_all(out).await?;
            stderr.write_all(err).await?;
        }
        Delivery::StderrFirst => {
            stderr.write_all(err).await?;
            tokio::task::yield_now().await;
            stdout.write_all(out).await?;
        }
        Delivery::Chunked(n) => {
            for chunk in out.chunks(n) {
                stdout.write_all(chunk).await?;
                tokio::task::yield_now().await;
            }
            for chunk in err.chunks(n) {
                stderr.write_all(chunk).await?;
                tokio::task::yield_now().await;
            }
        }
        Delivery::Interleaved => {
            let longest = out.len().max(err.len());
            for i in 0..longest {
                if let Some(b) = out.get(i) {
                    stdout.write_all(std::slice::from_ref(b)).await?;
                }
                if let Some(b) = err.get(i) {
                    stderr.write_all(std::slice::from_ref(b)).await?;
                }
                tokio::task::yield_now().await;
            }
        }
    }
    Ok(())
}

/// Config matching the fake interpreter's `\n` line endings.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        line_ending: LineEnding::Lf,
        ..SessionConfig::default()
    }
}

/// Start a session over a scripted backend, returning the transcript too.
pub async fn scripted_session(
    handler: impl Fn(&str) -> Reply + Send + Sync + 'static,
) -> (Session, Arc<Mutex<Transcript>>) {
    scripted_session_with(test_config(), handler).await
}

pub async fn scripted_session_with(
    config: SessionConfig,
    handler: impl Fn(&str) -> Reply + Send + Sync + 'static,
) -> (Session, Arc<Mutex<Transcript>>) {
    let backend = ScriptedBackend::new(handler);
    let transcript = backend.transcript();
    let session = Session::with_backend(config, backend)
        .await
        .expect("scripted session should start");
    (session, transcript)
}

/// A handler that evaluates a tiny command language:
/// `echo <text>` prints to stdout, `warn <text>` prints to stderr,
/// `bad` is a parse error, `hang` never answers, `crash` exits.
pub fn mini_shell(command: &str) -> Reply {
    if let Some(text) = command.strip_prefix("echo ") {
        Reply::ok(format!("{text}\n"))
    } else if let Some(text) = command.strip_prefix("warn ") {
        Reply::ok("").with_stderr(format!("WARNING: {text}\n"))
    } else if command == "bad" {
        Reply::parse_error()
    } else if command == "hang" {
        Reply::hang()
    } else if command == "crash" {
        Reply::crash()
    } else {
        Reply::ok("")
    }
}
