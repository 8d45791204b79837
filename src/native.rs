//! Shared libraries whose exported data can be wrapped as buffers.
use crate::{
    error::{RefError, Result},
    heap::Heap,
    value::Buffer,
};
use gc_arena::Mutation;
use libloading::{Library, Symbol};
use std::{
    collections::HashMap,
    ffi::c_void,
    path::{Path, PathBuf},
};

pub struct NativeLibraries {
    root: PathBuf,
    libraries: HashMap<String, Library>,
}

impl NativeLibraries {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            libraries: HashMap::new(),
        }
    }

    /// Finds the first file under the search root whose name starts with `name`, falling back to
    /// letting the platform loader resolve `name` itself.
    fn locate(&self, name: &str) -> PathBuf {
        let found = self.root.read_dir().ok().and_then(|entries| {
            entries
                .filter_map(|e| e.ok())
                .find(|e| e.file_name().to_string_lossy().starts_with(name))
                .map(|e| e.path())
        });
        found.unwrap_or_else(|| PathBuf::from(name))
    }

    pub fn get_library(&mut self, name: &str) -> Result<&Library> {
        if !self.libraries.contains_key(name) {
            let path = self.locate(name);
            tracing::debug!("loading native library {}", path.display());
            // SAFETY: loading runs the library's initialisers; callers choose which libraries
            // to trust
            let library = unsafe { Library::new(&path) }
                .map_err(|e| RefError::Library(format!("{}: {e}", path.display())))?;
            self.libraries.insert(name.to_string(), library);
        }
        self.libraries
            .get(name)
            .ok_or_else(|| RefError::Library(name.to_string()))
    }

    /// The address of the exported symbol `symbol` in `library`.
    pub fn symbol_address(&mut self, library: &str, symbol: &str) -> Result<usize> {
        let l = self.get_library(library)?;
        // SAFETY: only the symbol's address is taken; it is never called or read here
        let sym: Symbol<*mut c_void> = unsafe { l.get(symbol.as_bytes()) }
            .map_err(|e| RefError::Library(format!("{library}::{symbol}: {e}")))?;
        Ok(*sym as usize)
    }

    pub fn loaded(&self) -> usize {
        self.libraries.len()
    }
}

impl<'gc> Heap<'gc> {
    /// The canonical view of `len` bytes at an exported data symbol.
    ///
    /// # Safety
    /// The symbol must name at least `len` bytes of data that stay mapped while the view is
    /// used, and the library must stay loaded.
    pub unsafe fn wrap_symbol(
        &mut self,
        gc: &Mutation<'gc>,
        libraries: &mut NativeLibraries,
        library: &str,
        symbol: &str,
        len: usize,
    ) -> Result<Buffer<'gc>> {
        let address = libraries.symbol_address(library, symbol)?;
        self.wrap(gc, address, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_is_an_error() {
        let mut libraries = NativeLibraries::new(std::env::temp_dir());
        let result = libraries.symbol_address("librefbridge-does-not-exist", "anything");
        assert!(matches!(result, Err(RefError::Library(_))));
        assert_eq!(libraries.loaded(), 0);
    }
}
