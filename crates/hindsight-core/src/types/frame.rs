//! Resolved frame description.

/// What the resolvers recovered for a single stack frame
///
/// Every field is optional in effect: an empty `name`, an empty
/// `source_file`, or a `source_line` of 0 means that piece of information
/// could not be recovered. Resolution never fails outright; it produces one
/// of these with however much survived. Two frames resolved from the same
/// address compare equal, which makes repeatability cheap to assert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameInfo
{
    /// Demangled function name, or `""` when unknown
    pub name: String,
    /// Source file path, or `""` when unknown
    pub source_file: String,
    /// 1-based source line, or `0` when unknown
    pub source_line: u32,
}

impl FrameInfo
{
    /// True when no resolver recovered anything for this frame.
    ///
    /// Formatting falls back to the frame's hexadecimal address in that case.
    pub fn is_unresolved(&self) -> bool
    {
        self.name.is_empty() && self.source_file.is_empty() && self.source_line == 0
    }

    /// True when both the file and the line are known.
    pub fn has_location(&self) -> bool
    {
        !self.source_file.is_empty() && self.source_line != 0
    }
}
