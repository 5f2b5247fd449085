//! Plain-text trace reports.
//!
//! One line per frame, `{index}# {description}`, with single-digit indices
//! padded by one leading space so the first ten frames line up with the
//! rest. Descriptions come straight from [`Symbolizer::describe`]; nothing
//! here re-resolves or reorders anything.

use std::fmt::Write;

use crate::symbols::Symbolizer;
use crate::types::Address;

/// Rough bytes per rendered line, used to size the output buffer.
const BYTES_PER_FRAME: usize = 64;

/// Render a captured address sequence into a numbered report.
///
/// ## Example
///
/// ```rust
/// use hindsight_core::{capture, render_report, Symbolizer};
///
/// let trace = capture(32);
/// let symbolizer = Symbolizer::new();
/// print!("{}", render_report(&symbolizer, trace.addresses()));
/// ```
pub fn render_report(symbolizer: &Symbolizer, addresses: &[Address]) -> String
{
    render_lines(addresses.iter().map(|addr| symbolizer.describe(*addr)))
}

fn render_lines(descriptions: impl Iterator<Item = String>) -> String
{
    let (low, _) = descriptions.size_hint();
    let mut out = String::with_capacity(low * BYTES_PER_FRAME);
    for (index, description) in descriptions.enumerate() {
        // Width 2 right-aligns: one leading space for indices 0-9.
        let _ = writeln!(out, "{index:2}# {description}");
    }
    out
}
