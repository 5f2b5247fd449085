//! External resolver tool invocation.
//!
//! When in-process debug info cannot answer (stripped binary, foreign
//! module, malformed DWARF), addresses can still be resolved by shelling
//! out to `addr2line`. Each query spawns one short-lived child with its
//! stdout piped back to us. The child is killed and reaped on every exit
//! path, and a stuck tool is abandoned at a deadline instead of hanging
//! the caller.

use std::env;
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TraceError};
use crate::types::Address;

use super::demangle::scrub_unknown;

const DEFAULT_TOOL: &str = "addr2line";
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Pipe reads happen in chunks of this size.
const READ_CHUNK: usize = 4096;

/// Where the external tool lives and how long one query may take.
#[derive(Debug, Clone)]
pub struct ToolSettings
{
    /// Executable to spawn; resolved through `PATH` when not absolute
    pub command: PathBuf,
    /// Per-query deadline; expiry kills the child and keeps partial output
    pub timeout: Duration,
}

impl ToolSettings
{
    /// Read settings from the environment.
    ///
    /// `HINDSIGHT_ADDR2LINE` overrides the tool (default `addr2line`);
    /// `HINDSIGHT_TOOL_TIMEOUT_MS` overrides the deadline (default 5000).
    pub fn from_env() -> Self
    {
        let command = env::var_os("HINDSIGHT_ADDR2LINE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOL));
        let timeout = env::var("HINDSIGHT_TOOL_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        Self { command, timeout }
    }
}

/// Which fields one query asks the tool for.
///
/// Each variant maps to one flag spelling understood by `addr2line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ToolQuery
{
    /// Function name (`-fe`): two output lines, name then location
    FunctionName,
    /// Name plus pretty location (`-Cfpe`): one `name at file:line` line
    FunctionAndLocation,
    /// Location only (`-e`): one `file:line` line
    Location,
}

impl ToolQuery
{
    fn flag(self) -> &'static str
    {
        match self {
            ToolQuery::FunctionName => "-fe",
            ToolQuery::FunctionAndLocation => "-Cfpe",
            ToolQuery::Location => "-e",
        }
    }
}

/// Fields recovered from one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ToolOutput
{
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: u32,
}

impl ToolOutput
{
    fn is_empty(&self) -> bool
    {
        self.function.is_none() && self.file.is_none() && self.line == 0
    }
}

/// One running tool invocation.
///
/// Owns the child process and the read side of its stdout pipe. Dropping
/// the handle kills and reaps the child if it is still running, so no exit
/// path of the caller can leak a zombie or leave a runaway tool behind.
struct ToolChild
{
    child: Child,
    active: bool,
}

impl ToolChild
{
    fn spawn(settings: &ToolSettings, query: ToolQuery, module: &Path, addr: Address) -> Result<Self>
    {
        let child = Command::new(&settings.command)
            .arg(query.flag())
            .arg(module)
            .arg(addr.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| TraceError::Tool(format!("failed to spawn {}: {err}", settings.command.display())))?;

        Ok(Self { child, active: true })
    }

    /// Drain stdout until EOF or the deadline, whichever comes first.
    ///
    /// On deadline expiry the child is killed and whatever was read so far
    /// is kept. Trailing newline characters are trimmed either way.
    fn read_to_deadline(&mut self, timeout: Duration) -> Result<String>
    {
        let Some(mut stdout) = self.child.stdout.take() else {
            return Err(TraceError::Tool("child has no stdout pipe".to_string()));
        };
        let fd = stdout.as_raw_fd();
        let deadline = Instant::now() + timeout;
        let mut raw = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                // Too slow; keep what we have and stop the child.
                self.shutdown();
                break;
            }

            let mut pollfd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };
            let timeout_ms = remaining.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
            // SAFETY: pollfd points at one valid descriptor for the
            // duration of the call.
            let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
            if ready < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                self.shutdown();
                return Err(TraceError::Tool(format!("poll on tool stdout failed: {err}")));
            }
            if ready == 0 {
                continue; // deadline re-checked at the top
            }

            match stdout.read(&mut chunk) {
                Ok(0) => break, // EOF, the tool closed its end
                Ok(n) => raw.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.shutdown();
                    return Err(TraceError::Tool(format!("read from tool failed: {err}")));
                }
            }
        }

        let mut text = String::from_utf8_lossy(&raw).into_owned();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        Ok(text)
    }

    /// Kill and reap the child if it has not exited yet.
    fn shutdown(&mut self)
    {
        if self.active {
            // Best effort - both calls are no-ops on an exited child
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.active = false;
        }
    }
}

impl Drop for ToolChild
{
    fn drop(&mut self)
    {
        self.shutdown();
    }
}

/// Ask the external tool about one address in one module.
///
/// Returns `None` when the tool cannot be spawned, answers nothing before
/// the deadline, or prints only placeholders. Every failure here is
/// recoverable: the caller just ends up with emptier fields.
pub(crate) fn query(settings: &ToolSettings, kind: ToolQuery, module: &Path, addr: Address) -> Option<ToolOutput>
{
    let mut child = match ToolChild::spawn(settings, kind, module, addr) {
        Ok(child) => child,
        Err(err) => {
            debug!(tool = %settings.command.display(), error = %err, "external tool unavailable");
            return None;
        }
    };

    let raw = match child.read_to_deadline(settings.timeout) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(error = %err, "external tool query failed");
            return None;
        }
    };
    drop(child);

    let output = parse_tool_output(&raw, kind);
    if output.is_empty() {
        None
    } else {
        Some(output)
    }
}

/// Parse one tool invocation's stdout into fields.
///
/// The grammar depends on the query: `-fe` prints two lines (name, then
/// location), `-Cfpe` prints `name at file:line` on one line, and `-e`
/// prints `file:line` alone. Unknown fields come back as `??` (or `?` for
/// the line) and collapse to absent. Anything malformed parses as absent
/// rather than failing; the tool's output is advisory.
fn parse_tool_output(raw: &str, kind: ToolQuery) -> ToolOutput
{
    let mut output = ToolOutput::default();
    let text = raw.trim_end_matches(['\n', '\r']);
    if text.is_empty() {
        return output;
    }

    match kind {
        ToolQuery::FunctionName => {
            // First line is the name; a location line may follow.
            let name = text.lines().next().unwrap_or("");
            output.function = scrub_unknown(name).map(str::to_owned);
        }
        ToolQuery::FunctionAndLocation => {
            // `name at file:line`, where the name itself may contain
            // " at " - the location is everything past the last occurrence.
            match text.rfind(" at ") {
                Some(pos) => {
                    output.function = scrub_unknown(&text[..pos]).map(str::to_owned);
                    let (file, line) = split_location(&text[pos + 4..]);
                    output.file = file;
                    output.line = line;
                }
                None => {
                    output.function = scrub_unknown(text).map(str::to_owned);
                }
            }
        }
        ToolQuery::Location => {
            let location = text.lines().next().unwrap_or("");
            let (file, line) = split_location(location);
            output.file = file;
            output.line = line;
        }
    }

    output
}

/// Split `file:line` on the last colon, so colon-bearing paths keep their
/// prefix intact.
fn split_location(location: &str) -> (Option<String>, u32)
{
    let Some(colon) = location.rfind(':') else {
        return (scrub_unknown(location).map(str::to_owned), 0);
    };

    let file = scrub_unknown(&location[..colon]).map(str::to_owned);
    let line = parse_line_number(&location[colon + 1..]);
    (file, line)
}

/// Parse the line token, tolerating suffixes like `12 (discriminator 2)`.
fn parse_line_number(token: &str) -> u32
{
    let digits: String = token.trim_start().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_two_line_name_output()
    {
        let raw = "_ZN4core3fmt5write17h1234567890abcdefE\n/src/fmt.rs:1182\n";
        let out = parse_tool_output(raw, ToolQuery::FunctionName);
        assert_eq!(out.function.as_deref(), Some("_ZN4core3fmt5write17h1234567890abcdefE"));
        assert_eq!(out.file, None);
        assert_eq!(out.line, 0);
    }

    #[test]
    fn test_parse_pretty_output()
    {
        let raw = "core::fmt::write at /src/fmt.rs:1182\n";
        let out = parse_tool_output(raw, ToolQuery::FunctionAndLocation);
        assert_eq!(out.function.as_deref(), Some("core::fmt::write"));
        assert_eq!(out.file.as_deref(), Some("/src/fmt.rs"));
        assert_eq!(out.line, 1182);
    }

    #[test]
    fn test_parse_location_output()
    {
        let out = parse_tool_output("/src/main.rs:42\n", ToolQuery::Location);
        assert_eq!(out.file.as_deref(), Some("/src/main.rs"));
        assert_eq!(out.line, 42);
    }

    #[test]
    fn test_placeholders_collapse_to_absent()
    {
        let out = parse_tool_output("??\n??:0\n", ToolQuery::FunctionName);
        assert!(out.is_empty());

        let out = parse_tool_output("?? at ??:0\n", ToolQuery::FunctionAndLocation);
        assert!(out.is_empty());

        let out = parse_tool_output("??:?\n", ToolQuery::Location);
        assert!(out.is_empty());
    }

    #[test]
    fn test_discriminator_suffix_still_yields_line()
    {
        let out = parse_tool_output("main at /src/main.rs:7 (discriminator 2)\n", ToolQuery::FunctionAndLocation);
        assert_eq!(out.function.as_deref(), Some("main"));
        assert_eq!(out.file.as_deref(), Some("/src/main.rs"));
        assert_eq!(out.line, 7);
    }

    #[test]
    fn test_name_containing_at_splits_on_last_occurrence()
    {
        let raw = "parse at end at /src/lex.rs:19\n";
        let out = parse_tool_output(raw, ToolQuery::FunctionAndLocation);
        assert_eq!(out.function.as_deref(), Some("parse at end"));
        assert_eq!(out.file.as_deref(), Some("/src/lex.rs"));
        assert_eq!(out.line, 19);
    }

    #[test]
    fn test_pretty_output_without_location_keeps_name()
    {
        let out = parse_tool_output("main\n", ToolQuery::FunctionAndLocation);
        assert_eq!(out.function.as_deref(), Some("main"));
        assert_eq!(out.file, None);
        assert_eq!(out.line, 0);
    }

    #[test]
    fn test_malformed_line_number_parses_as_unknown()
    {
        let out = parse_tool_output("/src/main.rs:abc\n", ToolQuery::Location);
        assert_eq!(out.file.as_deref(), Some("/src/main.rs"));
        assert_eq!(out.line, 0);
    }

    #[test]
    fn test_empty_output_is_empty()
    {
        assert!(parse_tool_output("", ToolQuery::Location).is_empty());
        assert!(parse_tool_output("\n\n", ToolQuery::FunctionName).is_empty());
    }

    #[test]
    fn test_flags_match_tool_grammar()
    {
        assert_eq!(ToolQuery::FunctionName.flag(), "-fe");
        assert_eq!(ToolQuery::FunctionAndLocation.flag(), "-Cfpe");
        assert_eq!(ToolQuery::Location.flag(), "-e");
    }

    #[test]
    fn test_settings_from_env_defaults()
    {
        // Scoped to names nothing else sets to keep the test hermetic.
        std::env::remove_var("HINDSIGHT_ADDR2LINE");
        std::env::remove_var("HINDSIGHT_TOOL_TIMEOUT_MS");
        let settings = ToolSettings::from_env();
        assert_eq!(settings.command, PathBuf::from("addr2line"));
        assert_eq!(settings.timeout, Duration::from_millis(5000));
    }
}
