//! Tests for end-to-end address resolution.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use hindsight_core::{capture, render_report, Address, BackendKind, CaptureBuffer, Symbolizer, ToolSettings};

#[inline(never)]
fn well_known_probe() -> CaptureBuffer
{
    capture(64)
}

/// Write an executable shell script standing in for the external tool.
fn fake_tool(dir: &tempfile::TempDir, body: &str) -> PathBuf
{
    let path = dir.path().join("fake-addr2line");
    let mut file = fs::File::create(&path).expect("create fake tool");
    writeln!(file, "#!/bin/sh\n{body}").expect("write fake tool");
    drop(file);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake tool");
    path
}

fn external_with(tool: PathBuf) -> Symbolizer
{
    Symbolizer::with_backend(BackendKind::External).tool_settings_override(ToolSettings {
        command: tool,
        timeout: Duration::from_millis(2000),
    })
}

#[test]
fn test_own_frame_resolves_to_its_function_name()
{
    // Test binaries are built with debug info, so the in-process backend
    // must name the probe function somewhere in its own captured stack.
    let symbolizer = Symbolizer::new();
    if symbolizer.backend() != BackendKind::InProcess {
        // Stripped test binary; the property under test does not apply.
        return;
    }

    let trace = well_known_probe();
    let resolved: Vec<_> = trace.addresses().iter().map(|addr| symbolizer.resolve(*addr)).collect();

    let probe = resolved
        .iter()
        .find(|info| info.name.contains("well_known_probe"))
        .unwrap_or_else(|| panic!("probe frame not found in {resolved:#?}"));
    assert!(
        probe.source_file.ends_with("resolve.rs"),
        "unexpected file {:?}",
        probe.source_file
    );
    assert_ne!(probe.source_line, 0);
}

#[test]
fn test_wild_address_is_fully_unresolved()
{
    let symbolizer = Symbolizer::with_backend(BackendKind::InProcess)
        .tool_settings_override(ToolSettings {
            command: PathBuf::from("/nonexistent/fake-addr2line"),
            timeout: Duration::from_millis(100),
        });

    let info = symbolizer.resolve(Address::from(0x1u64));
    assert!(info.is_unresolved(), "got {info:?}");
    assert_eq!(symbolizer.describe(Address::from(0x1u64)), "0x0000000000000001");
}

#[test]
fn test_resolving_twice_is_repeatable()
{
    let symbolizer = Symbolizer::new();
    let trace = well_known_probe();
    for addr in trace.addresses() {
        assert_eq!(symbolizer.resolve(*addr), symbolizer.resolve(*addr));
    }
}

#[test]
fn test_report_renders_wild_addresses_as_hex()
{
    let symbolizer = Symbolizer::with_backend(BackendKind::InProcess)
        .tool_settings_override(ToolSettings {
            command: PathBuf::from("/nonexistent/fake-addr2line"),
            timeout: Duration::from_millis(100),
        });

    let report = render_report(&symbolizer, &[Address::from(0x1u64)]);
    assert_eq!(report, " 0# 0x0000000000000001\n");
}

#[test]
fn test_external_backend_fills_fields_from_tool_output()
{
    let dir = tempfile::tempdir().expect("tempdir");
    let tool = fake_tool(&dir, r#"echo "my_cool_function at /tmp/fake.rs:42""#);
    let symbolizer = external_with(tool);

    let info = symbolizer.resolve(Address::from(0x1000u64));
    assert_eq!(info.name, "my_cool_function");
    assert_eq!(info.source_file, "/tmp/fake.rs");
    assert_eq!(info.source_line, 42);
}

#[test]
fn test_external_backend_demangles_tool_output()
{
    let dir = tempfile::tempdir().expect("tempdir");
    let tool = fake_tool(
        &dir,
        r#"echo "_ZN4core3ptr13drop_in_place17h1c7c11fe0c0b7b63E at /src/ptr.rs:7""#,
    );
    let symbolizer = external_with(tool);

    let info = symbolizer.resolve(Address::from(0x1000u64));
    assert!(info.name.starts_with("core::ptr::drop_in_place"), "got {:?}", info.name);
}

#[test]
fn test_external_backend_collapses_placeholder_output()
{
    let dir = tempfile::tempdir().expect("tempdir");
    let tool = fake_tool(&dir, r#"echo "?? at ??:0""#);
    let symbolizer = external_with(tool);

    let info = symbolizer.resolve(Address::from(0x1000u64));
    assert!(info.name.is_empty(), "placeholder leaked: {:?}", info.name);
    assert!(info.source_file.is_empty(), "placeholder leaked: {:?}", info.source_file);
    assert_eq!(info.source_line, 0);
}
