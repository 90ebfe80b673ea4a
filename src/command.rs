//! Command-runner abstraction used by subprocess-backed scanners (spec
//! §4.3, §9). Kept as a trait so tests can inject canned output instead
//! of shelling out to a real `docker` binary.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Runs a program to completion within `deadline`, killing it if it
/// overruns. Returns captured stdout on a zero exit status, `None`
/// otherwise (missing binary, non-zero exit, timeout).
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str], deadline: Duration) -> Option<Vec<u8>>;
}

/// Runs real subprocesses via `std::process::Command`, polling
/// `try_wait` so an overrunning child is killed rather than blocking
/// the scanner indefinitely.
pub struct SystemCommandRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str], deadline: Duration) -> Option<Vec<u8>> {
        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .ok()?;

        let start = Instant::now();
        let status = loop {
            if let Ok(Some(status)) = child.try_wait() {
                break Some(status);
            }
            if start.elapsed() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let status = status?;
        if !status.success() {
            return None;
        }

        let mut stdout = Vec::new();
        child.stdout.take()?.read_to_end(&mut stdout).ok()?;
        Some(stdout)
    }
}

#[cfg(test)]
pub struct FakeCommandRunner {
    pub output: Option<Vec<u8>>,
}

#[cfg(test)]
impl CommandRunner for FakeCommandRunner {
    fn run(&self, _program: &str, _args: &[&str], _deadline: Duration) -> Option<Vec<u8>> {
        self.output.clone()
    }
}
