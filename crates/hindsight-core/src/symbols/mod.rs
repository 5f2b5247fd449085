//! # Symbol Resolution
//!
//! Turns raw instruction addresses into readable frame descriptions.
//!
//! Three resolvers of decreasing reliability and increasing cost:
//!
//! 1. [`debuginfo`] - DWARF parsed from the running executable, in-process.
//!    Full name/file/line when the binary carries debug info.
//! 2. [`dynamic`] - the runtime linker's symbol tables via `dladdr`.
//!    Always answers for a mapped address, but Rust binaries export little,
//!    so usually just a module path.
//! 3. [`tool`] - an external `addr2line` child process, one per query.
//!    Works on stripped-in-memory setups where the on-disk file still has
//!    debug info, at the price of a subprocess.
//!
//! [`Symbolizer`] composes them in that order and owns the fallback logic;
//! the individual resolvers know nothing about each other.

pub mod debuginfo;
pub mod demangle;
pub mod dynamic;
pub mod tool;

use std::path::PathBuf;

use gimli::{Dwarf, EndianArcSlice, RunTimeEndian};
use tracing::debug;

use crate::types::{Address, FrameInfo};

pub use demangle::demangle;
pub use dynamic::DynamicSymbol;
pub use tool::ToolSettings;

use tool::ToolQuery;

type OwnedReader = EndianArcSlice<RunTimeEndian>;
type OwnedDwarf = Dwarf<OwnedReader>;

/// Which resolution strategy a [`Symbolizer`] leads with.
///
/// Selected once at construction by capability detection; the dynamic
/// symbol table and the external tool remain available as fallbacks in
/// either mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind
{
    /// DWARF lookups against the running executable, no subprocess
    InProcess,
    /// Every query goes to the external tool
    External,
}

impl BackendKind
{
    /// Human-readable backend name for diagnostics and the CLI.
    pub fn as_str(self) -> &'static str
    {
        match self {
            BackendKind::InProcess => "in-process",
            BackendKind::External => "external",
        }
    }
}

/// Address-to-frame resolver for the current process
///
/// Construction picks a backend and reads the external tool settings from
/// the environment; after that, [`resolve`](Self::resolve) and
/// [`describe`](Self::describe) never fail - they degrade field by field
/// down to a bare hexadecimal address.
///
/// ## Example
///
/// ```rust
/// use hindsight_core::{capture, Symbolizer};
///
/// let symbolizer = Symbolizer::new();
/// for addr in capture(16).addresses() {
///     println!("{}", symbolizer.describe(*addr));
/// }
/// ```
#[derive(Debug)]
pub struct Symbolizer
{
    backend: BackendKind,
    tool: ToolSettings,
}

impl Symbolizer
{
    /// Create a symbolizer, detecting the best available backend.
    ///
    /// In-process resolution is used when the running executable's debug
    /// info parses; otherwise every query shells out to the external tool.
    /// Detection triggers the one-time DWARF parse, so the first
    /// construction bears that cost for the whole process.
    pub fn new() -> Self
    {
        let backend = if debuginfo::available() {
            BackendKind::InProcess
        } else {
            debug!("no usable debug info in the running executable, using the external tool");
            BackendKind::External
        };
        Self::with_backend(backend)
    }

    /// Create a symbolizer with an explicitly chosen backend.
    ///
    /// Used by the CLI's `--backend` flag and by tests that need to force
    /// the external path on a binary that has debug info.
    pub fn with_backend(backend: BackendKind) -> Self
    {
        Self {
            backend,
            tool: ToolSettings::from_env(),
        }
    }

    /// Replace the external tool settings, overriding the environment.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use hindsight_core::{BackendKind, Symbolizer, ToolSettings};
    ///
    /// let symbolizer = Symbolizer::with_backend(BackendKind::External).tool_settings_override(ToolSettings {
    ///     command: "/opt/llvm/bin/llvm-addr2line".into(),
    ///     timeout: Duration::from_millis(500),
    /// });
    /// ```
    pub fn tool_settings_override(mut self, tool: ToolSettings) -> Self
    {
        self.tool = tool;
        self
    }

    /// The backend this symbolizer leads with.
    pub fn backend(&self) -> BackendKind
    {
        self.backend
    }

    /// External tool configuration in effect for this symbolizer.
    pub fn tool_settings(&self) -> &ToolSettings
    {
        &self.tool
    }

    /// Resolve one address into whatever the resolvers can recover.
    ///
    /// Precedence is fixed: in-process debug info first (when that backend
    /// is active), then the dynamic symbol table for a name, then the
    /// external tool for any fields still missing. Later resolvers are
    /// only consulted when earlier ones under-deliver, so the common
    /// debug-build case never spawns a process. The returned name is
    /// demangled; placeholder tokens never survive into the result.
    ///
    /// Resolution is total: an address no resolver knows comes back as a
    /// fully unresolved [`FrameInfo`], not an error. Resolving the same
    /// address twice yields the same result.
    pub fn resolve(&self, addr: Address) -> FrameInfo
    {
        let mut info = FrameInfo::default();
        let nearest = dynamic::lookup(addr);

        if self.backend == BackendKind::InProcess {
            if let Some(found) = debuginfo::lookup(addr) {
                info = found;
            }
        }

        // The dynamic table is cheaper than spawning a process: a
        // nearest-symbol name beats asking the tool for one.
        if info.name.is_empty() {
            if let Some(symbol) = nearest.as_ref().and_then(|near| near.symbol.clone()) {
                info.name = symbol;
            }
        }

        if info.name.is_empty() || !info.has_location() {
            self.fill_from_tool(addr, nearest.as_ref(), &mut info);
        }

        if let Some(name) = demangle::scrub_unknown(&info.name) {
            info.name = demangle(name);
        } else {
            info.name = String::new();
        }

        info
    }

    /// Ask the external tool for exactly the fields still missing.
    fn fill_from_tool(&self, addr: Address, nearest: Option<&DynamicSymbol>, info: &mut FrameInfo)
    {
        let Some(module) = nearest.map(|near| near.module_path.clone()).or_else(self_path) else {
            debug!(address = %addr, "no module path for external lookup");
            return;
        };

        let query = match (info.name.is_empty(), info.has_location()) {
            (true, false) => ToolQuery::FunctionAndLocation,
            (true, true) => ToolQuery::FunctionName,
            (false, false) => ToolQuery::Location,
            (false, true) => return,
        };

        let Some(output) = tool::query(&self.tool, query, &module, addr) else {
            debug!(address = %addr, module = %module.display(), "external tool recovered nothing");
            return;
        };

        if info.name.is_empty() {
            if let Some(function) = output.function {
                info.name = function;
            }
        }
        if !info.has_location() {
            if let Some(file) = output.file {
                info.source_file = file;
                info.source_line = output.line;
            }
        }
    }

    /// One-line description of an address for display.
    ///
    /// `name at file:line` when everything resolved, `name in module` or a
    /// bare name when parts are missing, and the hexadecimal address
    /// (plus ` in module` when the linker at least placed it) as the
    /// last resort.
    pub fn describe(&self, addr: Address) -> String
    {
        let info = self.resolve(addr);
        let has_location = info.has_location();

        let mut out = if info.name.is_empty() {
            addr.to_string()
        } else {
            info.name
        };

        if has_location {
            out.push_str(&format!(" at {}:{}", info.source_file, info.source_line));
        } else if let Some(near) = dynamic::lookup(addr) {
            out.push_str(&format!(" in {}", near.module_path.display()));
        }

        out
    }
}

impl Default for Symbolizer
{
    fn default() -> Self
    {
        Self::new()
    }
}

/// Self-path discovery for the external tool when `dladdr` cannot name the
/// module (statically linked main executables).
fn self_path() -> Option<PathBuf>
{
    std::env::current_exe().ok()
}
