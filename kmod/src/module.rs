use alloc::{string::String, vec::Vec};
use core::{ffi::c_int, fmt::Debug};

/// Entry point called when the module is loaded.
pub type InitFn = unsafe extern "C" fn() -> c_int;
/// Entry point called when the module is unloaded.
pub type ExitFn = unsafe extern "C" fn();

/// The `Module` struct represents a kernel module.
///
/// The `module!` macro places one of these in `.gnu.linkonce.this_module` so
/// the loader can find the init and exit hooks.
#[repr(C)]
#[derive(Default)]
pub struct Module {
    init: Option<InitFn>,
    exit: Option<ExitFn>,
}

impl Module {
    /// Creates a new `Module` instance with the given initialization and exit functions.
    pub const fn new(init_fn: Option<InitFn>, exit_fn: Option<ExitFn>) -> Self {
        Module {
            init: init_fn,
            exit: exit_fn,
        }
    }

    pub fn init_fn(&self) -> Option<InitFn> {
        self.init
    }

    pub fn exit_fn(&self) -> Option<ExitFn> {
        self.exit
    }
}

/// Key/value metadata read from a module's `.modinfo` section.
#[derive(Clone, Default)]
pub struct ModuleInfo {
    kv: Vec<(String, String)>,
}

impl Debug for ModuleInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ModuleInfo {{ ")?;
        for (idx, (k, v)) in self.kv.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, " }}")
    }
}

impl ModuleInfo {
    pub fn new() -> Self {
        ModuleInfo { kv: Vec::new() }
    }

    /// Parses a sequence of NUL-terminated `key=value` entries.
    ///
    /// Empty entries (section padding) and entries without `=` are skipped.
    pub fn parse(section: &[u8]) -> Self {
        let mut info = ModuleInfo::new();
        for entry in section.split(|&b| b == 0) {
            let Some(eq) = entry.iter().position(|&b| b == b'=') else {
                continue;
            };
            let key = String::from_utf8_lossy(&entry[..eq]).into_owned();
            let value = String::from_utf8_lossy(&entry[eq + 1..]).into_owned();
            info.add_kv(key, value);
        }
        info
    }

    pub fn add_kv(&mut self, key: String, value: String) {
        self.kv.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.kv
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.kv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kv.is_empty()
    }
}
