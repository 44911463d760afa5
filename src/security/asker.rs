//! SecretAsker: run an askpass helper exactly once and share its result
//!
//! # Behavior
//!
//! - **Lazy**: constructing a `SecretAsker` starts nothing; the first call to
//!   any result-producing method launches the helper
//! - **Exactly once**: racing first callers all wait on the same invocation
//! - **Captured**: stdout and stderr are drained concurrently into memory;
//!   stderr is never echoed to the parent's stderr
//! - **Stable**: once the helper exits every caller sees the same output and
//!   the same errors, forever
//!
//! The helper runs on a dedicated thread with its own Tokio runtime. Dropping
//! a waiting future, or shutting down the runtime that made the first call,
//! never aborts it and never causes a second launch. Waiting works from any
//! executor.
//!
//! # Example
//!
//! ```rust,no_run
//! use passask::SecretAsker;
//!
//! #[tokio::main]
//! async fn main() {
//!     let askpass = std::env::var("SUDO_ASKPASS").unwrap_or_default();
//!     let asker = SecretAsker::new(askpass);
//!
//!     match asker.secret_as_string().await {
//!         Ok(password) => println!("Password: {}", password),
//!         Err(_) => eprint!("Failed to read a password\n{}", asker.diagnostic_output().await),
//!     }
//! }
//! ```

use crate::core::config::Shell;
use crate::core::error::{AskError, Stream};
use secrecy::SecretString;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Once, OnceLock};
use std::thread;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::runtime;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Outcome of the single helper invocation
#[derive(Debug, Default)]
struct Invocation {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    /// Start, exit, stdout read, stderr read; absent entries skipped
    errors: Vec<AskError>,
}

impl Invocation {
    fn failed(error: AskError) -> Self {
        Self {
            errors: vec![error],
            ..Default::default()
        }
    }

    fn primary_error(&self) -> Option<&AskError> {
        self.errors.first()
    }

    fn check(&self) -> Result<(), AskError> {
        match self.primary_error() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Contents of one drained pipe
struct Captured {
    data: Vec<u8>,
    error: Option<AskError>,
}

#[derive(Default)]
struct Shared {
    outcome: OnceLock<Invocation>,
    done: Notify,
}

impl Shared {
    /// Store the outcome and wake every waiter. Returns false if one was already stored.
    fn publish(&self, invocation: Invocation) -> bool {
        let stored = self.outcome.set(invocation).is_ok();
        self.done.notify_waiters();
        stored
    }
}

/// Owned by the invocation thread; if it is dropped before publishing, a
/// failure is recorded so waiters never hang.
struct Publisher {
    shared: Arc<Shared>,
}

impl Publisher {
    fn publish(self, invocation: Invocation) {
        if !self.shared.publish(invocation) {
            warn!("askpass outcome was already recorded");
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        if self.shared.outcome.get().is_none() {
            let source = io::Error::other("askpass invocation ended without a result");
            self.shared.publish(Invocation::failed(AskError::wait(source)));
        }
    }
}

/// Memoized, concurrency-safe askpass invocation
///
/// The command line is handed verbatim to the shell (`/bin/sh -c` by
/// default). Quoting anything embedded in it is the caller's job.
pub struct SecretAsker {
    command_line: OsString,
    shell: Shell,
    launch: Once,
    shared: Arc<Shared>,
}

impl SecretAsker {
    /// Create an asker that will run `command_line` with `/bin/sh -c`.
    ///
    /// No process is started until a result is requested.
    pub fn new(command_line: impl Into<OsString>) -> Self {
        Self::with_shell(command_line, Shell::default())
    }

    /// Create an asker that will run `command_line` with the given interpreter.
    ///
    /// # Example
    ///
    /// ```rust
    /// use passask::{SecretAsker, Shell};
    ///
    /// let asker = SecretAsker::with_shell("printf hello", Shell::new("/bin/bash", "-c"));
    /// assert!(!asker.is_complete());
    /// ```
    pub fn with_shell(command_line: impl Into<OsString>, shell: Shell) -> Self {
        Self {
            command_line: command_line.into(),
            shell,
            launch: Once::new(),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn command_line(&self) -> &OsStr {
        &self.command_line
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    /// Run the helper now if nobody has yet, and wait for it to finish.
    ///
    /// Returns the primary error, if any. The first call launches the
    /// invocation thread; it does not need to run inside a Tokio runtime.
    pub async fn invoke(&self) -> Result<(), AskError> {
        self.completed().await.check()
    }

    /// Captured stdout as text (invalid UTF-8 is replaced).
    pub async fn secret_as_string(&self) -> Result<String, AskError> {
        let bytes = self.secret_as_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Captured stdout, byte for byte.
    pub async fn secret_as_bytes(&self) -> Result<Vec<u8>, AskError> {
        let invocation = self.completed().await;
        invocation.check()?;
        Ok(invocation.stdout.clone())
    }

    /// Captured stdout, whether or not the invocation failed.
    ///
    /// Holds whatever the helper printed before exiting or before a read
    /// failure. Waits for the invocation like the other accessors.
    pub async fn output(&self) -> Vec<u8> {
        self.completed().await.stdout.clone()
    }

    /// Captured stdout wrapped so it is redacted from `Debug` output.
    pub async fn secret(&self) -> Result<SecretString, AskError> {
        self.secret_as_string().await.map(SecretString::from)
    }

    /// Captured stderr of the helper, for display when asking failed.
    ///
    /// Waits for the invocation like the other accessors.
    pub async fn diagnostic_output(&self) -> String {
        String::from_utf8_lossy(&self.completed().await.stderr).into_owned()
    }

    /// Every error recorded, most significant first.
    ///
    /// Empty until the invocation has completed.
    pub fn all_errors(&self) -> &[AskError] {
        self.shared
            .outcome
            .get()
            .map(|invocation| invocation.errors.as_slice())
            .unwrap_or(&[])
    }

    /// First entry of [`all_errors`](Self::all_errors), if any
    pub fn primary_error(&self) -> Option<&AskError> {
        self.all_errors().first()
    }

    /// Whether the helper has run to completion
    pub fn is_complete(&self) -> bool {
        self.shared.outcome.get().is_some()
    }

    /// Whether the helper completed without any recorded error
    pub fn succeeded(&self) -> bool {
        self.shared
            .outcome
            .get()
            .is_some_and(|invocation| invocation.errors.is_empty())
    }

    /// Launch the invocation once, then wait until its outcome is published.
    async fn completed(&self) -> &Invocation {
        self.launch.call_once(|| self.spawn_invocation());

        loop {
            // Register before checking so a publish in between is not missed
            let notified = self.shared.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(invocation) = self.shared.outcome.get() {
                return invocation;
            }
            notified.await;
        }
    }

    fn spawn_invocation(&self) {
        let shared = Arc::clone(&self.shared);
        let shell = self.shell.clone();
        let command_line = self.command_line.clone();

        let launched = thread::Builder::new()
            .name("passask-invocation".to_string())
            .spawn(move || {
                let publisher = Publisher { shared };
                let invocation = match runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt.block_on(run(&shell, &command_line)),
                    Err(e) => {
                        warn!(error = %e, "failed to build runtime for askpass helper");
                        Invocation::failed(AskError::start(&shell.program, e))
                    }
                };
                publisher.publish(invocation);
            });

        if let Err(e) = launched {
            warn!(error = %e, "failed to spawn askpass invocation thread");
            self.shared
                .publish(Invocation::failed(AskError::start(&self.shell.program, e)));
        }
    }
}

impl fmt::Debug for SecretAsker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretAsker")
            .field("command_line", &self.command_line)
            .field("shell", &self.shell)
            .field("complete", &self.is_complete())
            .field("errors", &self.all_errors())
            .finish_non_exhaustive()
    }
}

/// Run the helper to completion, recording every failure as data.
async fn run(shell: &Shell, command_line: &OsStr) -> Invocation {
    let mut invocation = Invocation::default();

    let mut command = Command::new(&shell.program);
    command
        .arg(&shell.flag)
        .arg(command_line)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(shell = %shell.program.display(), "starting askpass helper");
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(shell = %shell.program.display(), error = %e, "askpass helper failed to start");
            invocation.errors.push(AskError::start(&shell.program, e));
            return invocation;
        }
    };

    let (stdout, stderr) = tokio::join!(
        drain(child.stdout.take(), Stream::Stdout),
        drain(child.stderr.take(), Stream::Stderr),
    );

    let exit_error = match child.wait().await {
        Ok(status) if status.success() => None,
        Ok(status) => Some(AskError::Exit { status }),
        Err(e) => Some(AskError::wait(e)),
    };

    invocation.errors.extend(
        exit_error
            .into_iter()
            .chain(stdout.error)
            .chain(stderr.error),
    );
    invocation.stdout = stdout.data;
    invocation.stderr = stderr.data;

    if invocation.errors.is_empty() {
        info!(
            stdout_bytes = invocation.stdout.len(),
            stderr_bytes = invocation.stderr.len(),
            "askpass helper succeeded"
        );
    } else {
        warn!(
            errors = invocation.errors.len(),
            stderr_bytes = invocation.stderr.len(),
            "askpass helper failed"
        );
    }
    invocation
}

/// Read a pipe to its end. Bytes read before a failure are kept.
async fn drain<R>(pipe: Option<R>, stream: Stream) -> Captured
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        let source = io::Error::new(
            io::ErrorKind::BrokenPipe,
            format!("{} pipe was not captured", stream),
        );
        return Captured {
            data: Vec::new(),
            error: Some(AskError::stream_read(stream, source)),
        };
    };

    let mut data = Vec::new();
    let error = match pipe.read_to_end(&mut data).await {
        Ok(_) => None,
        Err(e) => Some(AskError::stream_read(stream, e)),
    };
    Captured { data, error }
}
