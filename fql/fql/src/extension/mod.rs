//! Plugin modules and the callback registry built from them.

mod backend;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use fql_parser::error::Error;

use crate::eval::{CallbackArg, CallbackDispatcher, DispatchResult};
use crate::ignorelist::IgnoreList;

pub use backend::{
    CallbackArgType, CallbackSignature, ExtensionBackend, ModuleInfo, SharedLibBackend,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Ok,
    NotFound,
    InvalidSignature,
}

struct ExtensionModule {
    path: PathBuf,
    info: ModuleInfo,
    callbacks: BTreeMap<String, Vec<CallbackArgType>>,
    backend: Box<dyn ExtensionBackend>,
}

/// All loaded plugin modules. Callback lookup walks modules in load order;
/// no guarantee is made when two modules export the same name.
#[derive(Default)]
pub struct ExtensionManager {
    modules: Vec<ExtensionModule>,
}

impl ExtensionManager {
    pub fn new() -> Self {
        ExtensionManager::default()
    }

    /// Register an already-loaded module, harvesting its metadata and
    /// callback table.
    pub fn register_module(
        &mut self,
        path: PathBuf,
        backend: Box<dyn ExtensionBackend>,
    ) -> Result<(), Error> {
        let (info, callbacks) = backend.discover()?;

        log::debug!(
            "registered extension `{}` with {} callback(s)",
            info.name,
            callbacks.len()
        );

        self.modules.push(ExtensionModule {
            path,
            info,
            callbacks: callbacks
                .into_iter()
                .map(|signature| (signature.name, signature.types))
                .collect(),
            backend,
        });

        Ok(())
    }

    /// Load every `.so` below `dir`, skipping ignore-listed files.
    pub fn load_directory(
        &mut self,
        dir: &Path,
        ignore: Option<&IgnoreList>,
    ) -> Result<usize, Error> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::new_simple(format!("couldn't open directory \"{}\": {e}", dir.display()))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "so"))
            .collect();
        paths.sort();

        let mut count = 0;

        for path in paths {
            if ignore.is_some_and(|list| list.matches(&path.to_string_lossy())) {
                log::info!("skipping ignore-listed extension {}", path.display());
                continue;
            }

            let backend = SharedLibBackend::load(&path)?;
            self.register_module(path, Box::new(backend))?;
            count += 1;
        }

        Ok(count)
    }

    /// Load modules from the default locations, honoring the ignore list.
    /// Returns the number of loaded modules; failures are reported and
    /// skipped.
    pub fn load_default(&mut self) -> usize {
        let mut ignore = IgnoreList::new();
        ignore.load_default();

        let mut count = 0;

        for dir in default_directories() {
            if !dir.is_dir() {
                continue;
            }

            match self.load_directory(&dir, Some(&ignore)) {
                Ok(n) => count += n,
                Err(e) => eprintln!("{e}"),
            }
        }

        count
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn find_callback(&self, name: &str) -> Option<(&ExtensionModule, &[CallbackArgType])> {
        self.modules.iter().find_map(|module| {
            module
                .callbacks
                .get(name)
                .map(|types| (module, types.as_slice()))
        })
    }

    /// Check that a callback exists and matches the given argument types.
    pub fn test_callback(&self, name: &str, types: &[CallbackArgType]) -> CallbackStatus {
        match self.find_callback(name) {
            Some((_, expected)) if expected == types => CallbackStatus::Ok,
            Some(_) => CallbackStatus::InvalidSignature,
            None => CallbackStatus::NotFound,
        }
    }

    /// Write a listing of every module and its callbacks.
    pub fn export(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for module in &self.modules {
            writeln!(
                out,
                "{}, version {} ({})",
                module.info.name,
                module.info.version,
                module.path.display()
            )?;

            if !module.info.description.is_empty() {
                writeln!(out, "\t{}", module.info.description)?;
            }

            for (name, types) in &module.callbacks {
                let types: Vec<&str> = types
                    .iter()
                    .map(|t| match t {
                        CallbackArgType::Integer => "integer",
                        CallbackArgType::String => "string",
                    })
                    .collect();

                writeln!(out, "\t{}({})", name, types.join(", "))?;
            }
        }

        Ok(())
    }
}

impl CallbackDispatcher for ExtensionManager {
    fn dispatch(&self, name: &str, filename: &str, args: &[CallbackArg]) -> DispatchResult {
        let types: Vec<CallbackArgType> = args
            .iter()
            .map(|arg| match arg {
                CallbackArg::Integer(_) => CallbackArgType::Integer,
                CallbackArg::Str(_) => CallbackArgType::String,
            })
            .collect();

        match self.test_callback(name, &types) {
            CallbackStatus::NotFound => DispatchResult::NotFound,
            CallbackStatus::InvalidSignature => DispatchResult::InvalidSignature,
            CallbackStatus::Ok => {
                let Some((module, _)) = self.find_callback(name) else {
                    return DispatchResult::NotFound;
                };

                match module.backend.invoke(name, filename, args) {
                    Ok(result) => DispatchResult::Ok(result),
                    Err(e) => {
                        eprintln!("{e}");
                        DispatchResult::NotFound
                    }
                }
            }
        }
    }
}

fn default_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Some(libdir) = std::env::var_os("FQL_LIBDIR") {
        dirs.push(PathBuf::from(libdir));
    }

    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(Path::new(&home).join(".fql").join("extensions"));
    }

    dirs.push(PathBuf::from("/etc/fql/extensions"));

    dirs
}
