//! Symbol demangling utilities.
//!
//! Compilers mangle symbol names to encode namespaces and type information.
//! This module turns them back into something a human can read:
//!
//! - **Rust**: the v0 scheme (`_R...`) and the legacy scheme (`_ZN...E`)
//! - **C++**: the legacy Rust scheme is a subset of Itanium mangling, so
//!   C++ symbols of that shape come out readable as well
//! - **C**: typically unmangled and passes through untouched
//!
//! Demangling never fails. Input that matches no known scheme is returned
//! unchanged, which also makes the operation idempotent on names that are
//! already readable.

use rustc_demangle::try_demangle;

/// Demangle a raw symbol name, passing it through untouched when no known
/// mangling scheme matches.
pub fn demangle(raw: &str) -> String
{
    match try_demangle(raw) {
        Ok(demangled) => demangled.to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Collapse the placeholder tokens the external tool prints for fields it
/// could not recover (`?` for lines, `??` for names and files), plus plain
/// empty fields, to `None`. Placeholders must never reach a `FrameInfo`.
pub(crate) fn scrub_unknown(field: &str) -> Option<&str>
{
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '?') {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_demangle_legacy_symbol()
    {
        let raw = "_ZN4core3ptr13drop_in_place17h1c7c11fe0c0b7b63E";
        let pretty = demangle(raw);
        assert!(pretty.starts_with("core::ptr::drop_in_place"), "got {pretty:?}");
    }

    #[test]
    fn test_demangle_passes_through_plain_names()
    {
        assert_eq!(demangle("main"), "main");
        assert_eq!(demangle(""), "");
        assert_eq!(demangle("not a symbol"), "not a symbol");
    }

    #[test]
    fn test_demangle_is_idempotent()
    {
        let raw = "_ZN9hindsight5probe17h0123456789abcdefE";
        let once = demangle(raw);
        let twice = demangle(&once);
        assert_eq!(once, twice);
        assert!(once.starts_with("hindsight::probe"), "got {once:?}");
    }

    #[test]
    fn test_scrub_unknown_tokens()
    {
        assert_eq!(scrub_unknown("??"), None);
        assert_eq!(scrub_unknown("?"), None);
        assert_eq!(scrub_unknown(""), None);
        assert_eq!(scrub_unknown("   "), None);
        assert_eq!(scrub_unknown("main"), Some("main"));
        assert_eq!(scrub_unknown(" main "), Some("main"));
    }
}
