//! Subprocess helpers shared by the probes, the Docker client, and the local session.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Run `cmd` with its output discarded, killing it if it outlives `timeout`.
/// Returns `None` when it could not be spawned or did not finish in time.
pub fn status_with_timeout(cmd: &mut Command, timeout: Duration) -> Option<ExitStatus> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) if Instant::now() < deadline => std::thread::sleep(POLL_INTERVAL),
            Ok(None) | Err(_) => {
                debug!("killing {:?} after {}s", cmd.get_program(), timeout.as_secs());
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    }
}

/// Put the child in its own process group so a terminal Ctrl-C reaches only
/// the host process, which then lets the running invocation finish.
pub fn isolate_from_terminal_signals(cmd: &mut Command) -> &mut Command {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd
}

/// Interleaving between stdout and stderr is not preserved: stdout comes first.
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}

/// Exit code, with `-1` for a child terminated by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Last `lines` lines of `text`.
pub fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    let mut out = String::new();
    if start > 0 {
        let _ = writeln!(out, "[... {start} earlier lines omitted]");
    }
    out.push_str(&all[start..].join("\n"));
    out
}

/// Non-empty lines of `pgrep` output.
pub fn parse_process_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Locate an executable by name on `search_path` (the process `PATH` when `None`).
pub fn find_executable(name: &str, search_path: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    if name.contains('/') {
        let p = PathBuf::from(name);
        return is_executable(&p).then_some(p);
    }
    let path = match search_path {
        Some(p) => p.to_owned(),
        None => std::env::var_os("PATH")?,
    };
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_lines() {
        let text = (1..=5).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let t = tail(&text, 2);
        assert!(t.starts_with("[... 3 earlier lines omitted]"));
        assert!(t.ends_with("line4\nline5"));
        assert_eq!(tail("only", 10), "only");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn isolated_child_leads_its_own_process_group() {
        let mut cmd = Command::new("sleep");
        cmd.arg("2");
        let mut child = isolate_from_terminal_signals(&mut cmd).spawn().unwrap();
        let stat = std::fs::read_to_string(format!("/proc/{}/stat", child.id())).unwrap();
        // fields after the parenthesised command name: state ppid pgrp
        let after_comm = &stat[stat.rfind(')').unwrap() + 2..];
        let pgrp: u32 = after_comm.split(' ').nth(2).unwrap().parse().unwrap();
        let _ = child.kill();
        let _ = child.wait();
        assert_eq!(pgrp, child.id());
    }

    #[test]
    fn parse_process_list_skips_blank_lines() {
        let list = parse_process_list("123 octave-cli run.m\n\n  456 octave-cli x.m  \n");
        assert_eq!(list, vec!["123 octave-cli run.m", "456 octave-cli x.m"]);
        assert!(parse_process_list("").is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn status_with_timeout_reports_exit() {
        let status = status_with_timeout(&mut Command::new("true"), Duration::from_secs(5));
        assert!(status.is_some_and(|s| s.success()));
        let status = status_with_timeout(&mut Command::new("false"), Duration::from_secs(5));
        assert!(status.is_some_and(|s| !s.success()));
    }

    #[cfg(unix)]
    #[test]
    fn status_with_timeout_kills_slow_child() {
        let start = Instant::now();
        let mut cmd = Command::new("sleep");
        cmd.arg("10");
        assert!(status_with_timeout(&mut cmd, Duration::from_millis(200)).is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn status_with_timeout_missing_binary_is_none() {
        let mut cmd = Command::new("octave-bridge-definitely-not-a-binary");
        assert!(status_with_timeout(&mut cmd, Duration::from_secs(1)).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn combined_output_appends_stderr() {
        let output = Command::new("sh")
            .args(["-c", "printf out; printf err >&2; exit 3"])
            .output()
            .unwrap();
        assert_eq!(combined_output(&output), "out\nerr");
        assert_eq!(exit_code(output.status), 3);
    }

    #[cfg(unix)]
    #[test]
    fn find_executable_searches_given_path() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("octave-cli");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        let plain = dir.path().join("octave");
        std::fs::write(&plain, "not executable").unwrap();

        let path = dir.path().as_os_str();
        assert_eq!(find_executable("octave-cli", Some(path)), Some(bin));
        assert_eq!(find_executable("octave", Some(path)), None);
    }
}
