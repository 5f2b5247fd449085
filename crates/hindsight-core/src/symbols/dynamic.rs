//! Dynamic symbol table lookups through the runtime linker.

use std::ffi::CStr;
use std::path::PathBuf;

use crate::types::Address;

/// What the runtime linker knows about an address
///
/// Produced by [`lookup`]. This is the cheapest resolver there is and the
/// only one that needs no debug info, so besides the nearest symbol it also
/// supplies the module path and load base the other resolvers build on.
#[derive(Debug, Clone)]
pub struct DynamicSymbol
{
    /// Path of the loaded object the address falls in
    pub module_path: PathBuf,
    /// Base address that object was mapped at
    pub module_base: Address,
    /// Nearest exported symbol at or below the address, still mangled
    pub symbol: Option<String>,
    /// Address of that symbol
    pub symbol_address: Option<Address>,
}

/// Look up `addr` in the dynamic symbol tables of all loaded objects.
///
/// Returns `None` when the address is not inside any loaded object, or when
/// the linker cannot name the object it is in. A `Some` result may still
/// carry no `symbol`: Rust executables export almost nothing, so for
/// own-code addresses the module path and base are usually all there is.
pub fn lookup(addr: Address) -> Option<DynamicSymbol>
{
    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    // dladdr never dereferences the probe; it only searches the link maps.
    let rc = unsafe { libc::dladdr(addr.value() as usize as *const libc::c_void, &mut info) };
    if rc == 0 || info.dli_fname.is_null() {
        return None;
    }

    // SAFETY: dli_fname points at a NUL-terminated string owned by the
    // runtime linker, valid for as long as the object stays loaded.
    let module_path = PathBuf::from(unsafe { CStr::from_ptr(info.dli_fname) }.to_string_lossy().into_owned());
    if module_path.as_os_str().is_empty() {
        return None;
    }

    let symbol = if info.dli_sname.is_null() {
        None
    } else {
        // SAFETY: same lifetime argument as dli_fname.
        Some(unsafe { CStr::from_ptr(info.dli_sname) }.to_string_lossy().into_owned())
    };

    Some(DynamicSymbol {
        module_path,
        module_base: Address::from(info.dli_fbase as usize),
        symbol,
        symbol_address: (!info.dli_saddr.is_null()).then(|| Address::from(info.dli_saddr as usize)),
    })
}

/// Load base of the running executable, recovered by asking the linker
/// where one of our own functions ended up.
///
/// Goes straight to `dladdr` instead of [`lookup`] so a linker that maps
/// the main program under an empty name still answers.
pub(crate) fn self_module_base() -> Option<Address>
{
    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    let probe = self_probe as usize as *const libc::c_void;
    let rc = unsafe { libc::dladdr(probe, &mut info) };
    if rc == 0 || info.dli_fbase.is_null() {
        return None;
    }
    Some(Address::from(info.dli_fbase as usize))
}

#[inline(never)]
fn self_probe() {}
