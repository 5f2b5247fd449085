//! In-process DWARF lookups against the running executable.
//!
//! The first query parses our own binary from disk: `object` splits out the
//! DWARF sections, `gimli` wraps them, and `addr2line` builds the context
//! that maps file addresses to functions and source lines. The parsed image
//! is cached for the life of the process, and a failed build is cached too,
//! so a stripped binary costs one attempt and nothing afterwards.
//!
//! Runtime addresses are translated to file addresses through the load
//! slide (mapped base minus link-time base) before querying, which keeps
//! lookups correct in position-independent executables.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use addr2line::Context;
use gimli::{Dwarf, EndianArcSlice, RunTimeEndian, SectionId};
use object::{Object, ObjectSection, ObjectSegment};
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::{Result, TraceError};
use crate::types::{Address, FrameInfo};

use super::dynamic;
use super::{OwnedDwarf, OwnedReader};

/// Process-wide cache: built at most once, `None` when the build failed.
static SELF_IMAGE: OnceCell<Option<Mutex<DebugImage>>> = OnceCell::new();

/// Sections fed to `gimli::Dwarf::load`; anything it asks for beyond these
/// is served as an empty slice.
const DWARF_SECTION_IDS: &[SectionId] = &[
    SectionId::DebugAbbrev,
    SectionId::DebugAddr,
    SectionId::DebugAranges,
    SectionId::DebugInfo,
    SectionId::DebugLine,
    SectionId::DebugLineStr,
    SectionId::DebugLoc,
    SectionId::DebugLocLists,
    SectionId::DebugRanges,
    SectionId::DebugRngLists,
    SectionId::DebugStr,
    SectionId::DebugStrOffsets,
    SectionId::DebugTypes,
];

/// Parsed debug information for the running executable.
///
/// Lives behind a `Mutex` in the process-wide cache: the addr2line context
/// parses line programs lazily on first touch, so queries mutate internal
/// caches even though the API reads like a lookup.
struct DebugImage
{
    path: PathBuf,
    slide: i64,
    runtime_range: (u64, u64),
    context: Context<OwnedReader>,
}

impl DebugImage
{
    fn load() -> Result<Self>
    {
        let path = std::env::current_exe()?;
        let mapped_base = dynamic::self_module_base().ok_or_else(|| TraceError::Image {
            path: path.clone(),
            reason: "runtime load base unavailable".to_string(),
        })?;

        let bytes = fs::read(&path)?;
        let data = Arc::<[u8]>::from(bytes);
        let file = object::File::parse(&*data).map_err(|err| TraceError::Image {
            path: path.clone(),
            reason: format!("not a parseable object file: {err}"),
        })?;

        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        // Link-time base is the lowest loadable segment; everything the
        // unwinder hands us is offset by wherever that segment actually
        // landed.
        let mut link_base = u64::MAX;
        let mut max_addr = 0u64;
        for segment in file.segments() {
            let start = segment.address();
            let end = start.saturating_add(segment.size());
            link_base = link_base.min(start);
            max_addr = max_addr.max(end);
        }
        if link_base == u64::MAX {
            return Err(TraceError::Image {
                path,
                reason: "no loadable segments".to_string(),
            });
        }

        let size = max_addr.saturating_sub(link_base);
        let runtime_start = mapped_base.value();
        let runtime_end = runtime_start.saturating_add(size);
        let slide = mapped_base.value() as i64 - link_base as i64;

        let mut sections = HashMap::new();
        for id in DWARF_SECTION_IDS {
            let name = id.name();
            let data = load_section_bytes(&file, name).map_err(|err| TraceError::Image {
                path: path.clone(),
                reason: format!("failed to read {name}: {err}"),
            })?;
            sections.insert(name, data);
        }

        let dwarf: OwnedDwarf =
            Dwarf::load(|section| Ok::<_, gimli::Error>(section_reader(&sections, endian, section))).map_err(|err| {
                TraceError::Image {
                    path: path.clone(),
                    reason: format!("failed to load DWARF: {err}"),
                }
            })?;
        let context = Context::from_dwarf(dwarf).map_err(|err| TraceError::Image {
            path: path.clone(),
            reason: format!("failed to build line-lookup context: {err}"),
        })?;

        Ok(Self {
            path,
            slide,
            runtime_range: (runtime_start, runtime_end),
            context,
        })
    }

    fn contains(&self, address: Address) -> bool
    {
        let addr = address.value();
        addr >= self.runtime_range.0 && addr < self.runtime_range.1
    }

    fn file_address(&self, address: Address) -> Option<u64>
    {
        if !self.contains(address) {
            return None;
        }

        let value = address.value();
        if self.slide >= 0 {
            value.checked_sub(self.slide as u64)
        } else {
            value.checked_add((-self.slide) as u64)
        }
    }

    /// Innermost function name and source location for a runtime address.
    ///
    /// Returns `None` when the address falls outside the executable or no
    /// line table covers it. Names come back raw (mangled); the
    /// orchestrator owns demangling.
    fn lookup(&self, address: Address) -> Option<FrameInfo>
    {
        let file_addr = self.file_address(address)?;

        let lookup = self.context.find_frames(file_addr);
        let mut frame_iter = match lookup.skip_all_loads() {
            Ok(iter) => iter,
            Err(err) => {
                debug!(address = %address, error = %err, "line table lookup failed");
                return None;
            }
        };

        // The iterator yields the innermost frame first; with inlining
        // there may be several, all covering the same address. Keep the
        // innermost name and innermost location seen.
        let mut info = FrameInfo::default();
        while let Ok(Some(frame)) = frame_iter.next() {
            if info.name.is_empty() {
                if let Some(name) = frame.function.as_ref().and_then(|func| func.raw_name().ok()) {
                    info.name = name.into_owned();
                }
            }
            if info.source_file.is_empty() {
                if let Some(location) = frame.location {
                    if let Some(file) = location.file {
                        info.source_file = file.to_string();
                        info.source_line = location.line.unwrap_or(0);
                    }
                }
            }
            if !info.name.is_empty() && !info.source_file.is_empty() {
                break;
            }
        }

        if info.is_unresolved() {
            None
        } else {
            Some(info)
        }
    }
}

fn self_image() -> Option<&'static Mutex<DebugImage>>
{
    SELF_IMAGE
        .get_or_init(|| match DebugImage::load() {
            Ok(image) => {
                debug!(path = %image.path.display(), "loaded debug info for the running executable");
                Some(Mutex::new(image))
            }
            Err(err) => {
                debug!(error = %err, "debug info unavailable, in-process lookups disabled");
                None
            }
        })
        .as_ref()
}

/// Whether in-process lookups are possible at all. Building the context
/// happens on the first call; the verdict never changes afterwards.
pub(crate) fn available() -> bool
{
    self_image().is_some()
}

/// Resolve a runtime address against the running executable's debug info.
pub(crate) fn lookup(addr: Address) -> Option<FrameInfo>
{
    let image = self_image()?;
    let image = image.lock().ok()?;
    image.lookup(addr)
}

fn section_reader(sections: &HashMap<&'static str, Arc<[u8]>>, endian: RunTimeEndian, id: SectionId) -> OwnedReader
{
    let data = sections.get(id.name()).cloned().unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
    EndianArcSlice::new(data, endian)
}

fn load_section_bytes(file: &object::File<'_>, name: &str) -> object::Result<Arc<[u8]>>
{
    let Some(section) = file.section_by_name(name) else {
        return Ok(Arc::<[u8]>::from(Vec::new()));
    };

    Ok(match section.uncompressed_data()? {
        Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes.to_vec()),
        Cow::Owned(vec) => vec.into(),
    })
}
