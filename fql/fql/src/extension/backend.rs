//! Backend abstraction over one loaded plugin module, with the
//! shared-library implementation.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::path::Path;

use fql_parser::error::Error;

use crate::eval::CallbackArg;

/// Declared type of one callback argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackArgType {
    Integer,
    String,
}

/// Metadata a module announces through its `registration` entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// One callback a module announces through its `discover` entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackSignature {
    pub name: String,
    pub types: Vec<CallbackArgType>,
}

/// A loaded plugin module. Unloading happens on drop.
pub trait ExtensionBackend {
    /// Module metadata and the callbacks it announces.
    fn discover(&self) -> Result<(ModuleInfo, Vec<CallbackSignature>), Error>;

    /// Invoke a callback. The implementation owns the argument buffers for
    /// the duration of the call.
    fn invoke(&self, name: &str, filename: &str, args: &[CallbackArg]) -> Result<i32, Error>;
}

// The C ABI of a plugin module:
//
//   void registration(void *ctx, register_extension_fn register);
//   void discover(void *ctx, register_callback_fn register);
//   int <callback>(const char *filename, int argc, void **argv);
//
// `register_callback_fn` takes the argument count and a pointer to an array
// of type tags (1 = integer, 2 = string).
type RegisterExtensionFn =
    unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char, *const c_char);
type RegistrationFn = unsafe extern "C" fn(*mut c_void, RegisterExtensionFn);
type RegisterCallbackFn = unsafe extern "C" fn(*mut c_void, *const c_char, u32, *const u32);
type DiscoverFn = unsafe extern "C" fn(*mut c_void, RegisterCallbackFn);
type CallbackFn = unsafe extern "C" fn(*const c_char, c_int, *const *const c_void) -> c_int;

const ARG_TYPE_INTEGER: u32 = 1;
const ARG_TYPE_STRING: u32 = 2;

/// Shared-library backend on top of `libloading`.
pub struct SharedLibBackend {
    library: libloading::Library,
}

impl SharedLibBackend {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
            Error::new_simple(format!(
                "couldn't load extension \"{}\": {e}",
                path.display()
            ))
        })?;

        Ok(SharedLibBackend { library })
    }
}

#[derive(Default)]
struct Harvest {
    info: ModuleInfo,
    callbacks: Vec<CallbackSignature>,
}

unsafe fn cstr_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

unsafe extern "C" fn collect_registration(
    ctx: *mut c_void,
    name: *const c_char,
    version: *const c_char,
    description: *const c_char,
) {
    let harvest = &mut *(ctx as *mut Harvest);

    harvest.info = ModuleInfo {
        name: cstr_to_string(name),
        version: cstr_to_string(version),
        description: cstr_to_string(description),
    };
}

unsafe extern "C" fn collect_callback(
    ctx: *mut c_void,
    name: *const c_char,
    argc: u32,
    types: *const u32,
) {
    let harvest = &mut *(ctx as *mut Harvest);
    let name = cstr_to_string(name);

    if name.is_empty() || argc >= 128 {
        return;
    }

    let mut signature = Vec::with_capacity(argc as usize);

    for i in 0..argc as usize {
        let tag = if types.is_null() { 0 } else { *types.add(i) };

        match tag {
            ARG_TYPE_INTEGER => signature.push(CallbackArgType::Integer),
            ARG_TYPE_STRING => signature.push(CallbackArgType::String),
            // An unknown tag drops the whole callback.
            _ => return,
        }
    }

    harvest.callbacks.push(CallbackSignature {
        name,
        types: signature,
    });
}

impl ExtensionBackend for SharedLibBackend {
    fn discover(&self) -> Result<(ModuleInfo, Vec<CallbackSignature>), Error> {
        let mut harvest = Harvest::default();
        let ctx = &mut harvest as *mut Harvest as *mut c_void;

        unsafe {
            if let Ok(registration) = self.library.get::<RegistrationFn>(b"registration") {
                registration(ctx, collect_registration);
            }

            if let Ok(discover) = self.library.get::<DiscoverFn>(b"discover") {
                discover(ctx, collect_callback);
            }
        }

        Ok((harvest.info, harvest.callbacks))
    }

    fn invoke(&self, name: &str, filename: &str, args: &[CallbackArg]) -> Result<i32, Error> {
        let callback = unsafe { self.library.get::<CallbackFn>(name.as_bytes()) }
            .map_err(|_| Error::new_simple(format!("function `{name}' not found")))?;

        let filename = CString::new(filename)
            .map_err(|_| Error::new_simple("filename contains a NUL byte"))?;

        // Keep the argument buffers alive across the call.
        enum Owned {
            Int(Box<i32>),
            Str(CString),
        }

        let owners: Result<Vec<Owned>, Error> = args
            .iter()
            .map(|arg| match arg {
                CallbackArg::Integer(n) => Ok(Owned::Int(Box::new(*n))),
                CallbackArg::Str(s) => CString::new(s.as_str())
                    .map(Owned::Str)
                    .map_err(|_| Error::new_simple("argument contains a NUL byte")),
            })
            .collect();
        let owners = owners?;

        let argv: Vec<*const c_void> = owners
            .iter()
            .map(|owned| match owned {
                Owned::Int(boxed) => &**boxed as *const i32 as *const c_void,
                Owned::Str(cstring) => cstring.as_ptr() as *const c_void,
            })
            .collect();

        let result =
            unsafe { callback(filename.as_ptr(), argv.len() as c_int, argv.as_ptr()) };

        Ok(result)
    }
}
