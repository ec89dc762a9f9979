#![warn(clippy::all, clippy::pedantic)]

//! Host services used by the model loaders.
//!
//! A [`Host`] bundles the callbacks a caller can install before loading models:
//! an [`Allocator`] consulted whenever model storage grows, a [`FileLoader`] and
//! [`FileReleaser`] pair that materialise whole files, and a [`PrintSink`] that
//! receives human-readable diagnostics.

use std::{
    collections::HashMap,
    fmt::{self, Display},
    fs, io,
    ops::Deref,
    sync::{Arc, RwLock},
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Severity of a diagnostic passed to a [`PrintSink`].
///
/// Levels are ordered from the least to the most severe, which is the order
/// used by the print threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrintLevel {
    Verbose,
    Normal,
    Warning,
    Error,
    Fatal,
}

impl Display for PrintLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrintLevel::Verbose => "verbose",
            PrintLevel::Normal => "normal",
            PrintLevel::Warning => "warning",
            PrintLevel::Error => "error",
            PrintLevel::Fatal => "fatal",
        })
    }
}

/// Accounting hooks for library storage.
///
/// The loaders never hand out raw memory; instead every growth of a model's
/// storage asks the allocator first, and every release reports the same size
/// back.
pub trait Allocator: Send + Sync {
    /// Called before storage grows by `size` bytes.
    /// Returning `false` fails the growth with an out of memory error.
    fn alloc(&self, size: usize) -> bool;

    /// Called when `size` bytes previously granted by [`Allocator::alloc`] are released.
    fn free(&self, size: usize);
}

impl<T: Allocator + ?Sized> Allocator for Arc<T> {
    fn alloc(&self, size: usize) -> bool {
        (**self).alloc(size)
    }

    fn free(&self, size: usize) {
        (**self).free(size);
    }
}

/// Grants every request, leaving the actual allocation to the global allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn alloc(&self, _size: usize) -> bool {
        true
    }

    fn free(&self, _size: usize) {}
}

/// Materialises a whole file.
pub trait FileLoader: Send + Sync {
    /// # Errors
    ///
    /// Returns `Err` if the file doesn't exist or can't be read.
    fn load_file(&self, name: &str) -> io::Result<Vec<u8>>;
}

impl<F> FileLoader for F
where
    F: Fn(&str) -> io::Result<Vec<u8>> + Send + Sync,
{
    fn load_file(&self, name: &str) -> io::Result<Vec<u8>> {
        self(name)
    }
}

/// Takes back a buffer produced by a [`FileLoader`].
pub trait FileReleaser: Send + Sync {
    fn free_file(&self, buffer: Vec<u8>);
}

impl<F> FileReleaser for F
where
    F: Fn(Vec<u8>) + Send + Sync,
{
    fn free_file(&self, buffer: Vec<u8>) {
        self(buffer);
    }
}

/// Receives diagnostics.
pub trait PrintSink: Send + Sync {
    fn print(&self, level: PrintLevel, message: &str);
}

impl<F> PrintSink for F
where
    F: Fn(PrintLevel, &str) + Send + Sync,
{
    fn print(&self, level: PrintLevel, message: &str) {
        self(level, message);
    }
}

/// Reads files from the OS filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileLoader;

impl FileLoader for StdFileLoader {
    fn load_file(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(name)
    }
}

/// Serves files from memory, keyed by the exact name passed to [`Host::load_file`].
#[derive(Debug, Default)]
pub struct MemoryFileLoader {
    files: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryFileLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.files
            .write()
            .expect("the lock shouldn't be poisoned")
            .insert(name.into(), bytes.into());
    }

    pub fn remove(&self, name: &str) -> bool {
        self.files
            .write()
            .expect("the lock shouldn't be poisoned")
            .remove(name)
            .is_some()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.files
            .read()
            .expect("the lock shouldn't be poisoned")
            .contains_key(name)
    }
}

impl FileLoader for MemoryFileLoader {
    fn load_file(&self, name: &str) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .expect("the lock shouldn't be poisoned")
            .get(name)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found"))
    }
}

/// Drops released buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropReleaser;

impl FileReleaser for DropReleaser {
    fn free_file(&self, buffer: Vec<u8>) {
        drop(buffer);
    }
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl PrintSink for TracingSink {
    fn print(&self, level: PrintLevel, message: &str) {
        match level {
            PrintLevel::Verbose => debug!("{}", message),
            PrintLevel::Normal => info!("{}", message),
            PrintLevel::Warning => warn!("{}", message),
            PrintLevel::Error => error!("{}", message),
            PrintLevel::Fatal => error!("fatal: {}", message),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadFileError {
    #[error("no file loader installed")]
    NoLoader,
    #[error("io error reading `{path}`: {error}")]
    Io { path: String, error: io::Error },
}

/// The callbacks used while loading models.
///
/// Cloning is cheap, every callback is reference counted.
#[derive(Clone)]
pub struct Host {
    allocator: Arc<dyn Allocator>,
    file_loader: Option<Arc<dyn FileLoader>>,
    file_releaser: Arc<dyn FileReleaser>,
    print_sink: Arc<dyn PrintSink>,
    print_level: PrintLevel,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            allocator: Arc::new(SystemAllocator),
            file_loader: None,
            file_releaser: Arc::new(DropReleaser),
            print_sink: Arc::new(TracingSink),
            print_level: PrintLevel::Verbose,
        }
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("file_loader", &self.file_loader.is_some())
            .field("print_level", &self.print_level)
            .finish_non_exhaustive()
    }
}

impl Host {
    /// Creates a host without a file loader.
    /// Loading files fails until one is installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a host that reads files from the OS filesystem.
    #[must_use]
    pub fn with_std_fs() -> Self {
        Self::default().with_file_loader(StdFileLoader)
    }

    #[must_use]
    pub fn with_allocator(mut self, allocator: impl Allocator + 'static) -> Self {
        self.set_allocator(allocator);
        self
    }

    #[must_use]
    pub fn with_file_loader(mut self, file_loader: impl FileLoader + 'static) -> Self {
        self.set_file_loader(file_loader);
        self
    }

    #[must_use]
    pub fn with_file_releaser(mut self, file_releaser: impl FileReleaser + 'static) -> Self {
        self.set_file_releaser(file_releaser);
        self
    }

    #[must_use]
    pub fn with_print_sink(mut self, print_sink: impl PrintSink + 'static) -> Self {
        self.set_print_sink(print_sink);
        self
    }

    #[must_use]
    pub fn with_print_level(mut self, print_level: PrintLevel) -> Self {
        self.set_print_level(print_level);
        self
    }

    pub fn set_allocator(&mut self, allocator: impl Allocator + 'static) {
        self.allocator = Arc::new(allocator);
    }

    pub fn set_file_loader(&mut self, file_loader: impl FileLoader + 'static) {
        self.file_loader = Some(Arc::new(file_loader));
    }

    pub fn clear_file_loader(&mut self) {
        self.file_loader = None;
    }

    pub fn set_file_releaser(&mut self, file_releaser: impl FileReleaser + 'static) {
        self.file_releaser = Arc::new(file_releaser);
    }

    pub fn set_print_sink(&mut self, print_sink: impl PrintSink + 'static) {
        self.print_sink = Arc::new(print_sink);
    }

    /// Messages below `print_level` are dropped before reaching the sink.
    pub fn set_print_level(&mut self, print_level: PrintLevel) {
        self.print_level = print_level;
    }

    #[must_use]
    pub fn allocator(&self) -> Arc<dyn Allocator> {
        Arc::clone(&self.allocator)
    }

    #[must_use]
    pub fn has_file_loader(&self) -> bool {
        self.file_loader.is_some()
    }

    #[must_use]
    pub fn print_level(&self) -> PrintLevel {
        self.print_level
    }

    pub fn print(&self, level: PrintLevel, message: &str) {
        if level >= self.print_level {
            self.print_sink.print(level, message);
        }
    }

    /// Loads a whole file through the installed loader.
    /// The buffer is handed to the file releaser when the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if no file loader is installed or the loader fails.
    pub fn load_file(&self, name: &str) -> Result<LoadedFile, LoadFileError> {
        let loader = self.file_loader.as_ref().ok_or(LoadFileError::NoLoader)?;

        let buffer = loader.load_file(name).map_err(|error| LoadFileError::Io {
            path: name.to_owned(),
            error,
        })?;

        debug!("loaded `{}` ({} bytes)", name, buffer.len());

        Ok(LoadedFile {
            buffer: Some(buffer),
            releaser: self.file_releaser.as_ref(),
        })
    }
}

/// A file buffer on loan from the host.
pub struct LoadedFile<'a> {
    buffer: Option<Vec<u8>>,
    releaser: &'a dyn FileReleaser,
}

impl LoadedFile<'_> {
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or_default()
    }
}

impl Deref for LoadedFile<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes()
    }
}

impl fmt::Debug for LoadedFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedFile")
            .field("len", &self.bytes().len())
            .finish_non_exhaustive()
    }
}

impl Drop for LoadedFile<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.releaser.free_file(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use super::*;

    #[test]
    fn load_without_loader_fails() {
        let host = Host::new();
        assert!(matches!(
            host.load_file("model.md3"),
            Err(LoadFileError::NoLoader)
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let host = Host::new().with_file_loader(MemoryFileLoader::new());
        match host.load_file("missing.md3") {
            Err(LoadFileError::Io { path, error }) => {
                assert_eq!(path, "missing.md3");
                assert_eq!(error.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected result: {:?}", other.map(|f| f.len())),
        };
    }

    #[test]
    fn buffer_is_released_once() {
        static RELEASED: AtomicUsize = AtomicUsize::new(0);

        let files = MemoryFileLoader::new();
        files.insert("a.bin", vec![1_u8, 2, 3]);

        let host = Host::new()
            .with_file_loader(files)
            .with_file_releaser(|buffer: Vec<u8>| {
                assert_eq!(buffer, [1, 2, 3]);
                RELEASED.fetch_add(1, Ordering::SeqCst);
            });

        let file = host.load_file("a.bin").unwrap();
        assert_eq!(&*file, &[1, 2, 3]);
        assert_eq!(RELEASED.load(Ordering::SeqCst), 0);
        drop(file);
        assert_eq!(RELEASED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn print_threshold_filters_messages() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink_messages = Arc::clone(&messages);

        let host = Host::new()
            .with_print_sink(move |level: PrintLevel, message: &str| {
                sink_messages
                    .lock()
                    .unwrap()
                    .push((level, message.to_owned()));
            })
            .with_print_level(PrintLevel::Warning);

        host.print(PrintLevel::Verbose, "dropped");
        host.print(PrintLevel::Normal, "dropped");
        host.print(PrintLevel::Warning, "kept");
        host.print(PrintLevel::Fatal, "kept too");

        let messages = messages.lock().unwrap();
        assert_eq!(
            *messages,
            vec![
                (PrintLevel::Warning, "kept".to_owned()),
                (PrintLevel::Fatal, "kept too".to_owned()),
            ]
        );
    }

    #[test]
    fn memory_loader_insert_and_remove() {
        let files = MemoryFileLoader::new();
        files.insert("x", vec![0_u8]);
        assert!(files.contains("x"));
        assert!(files.remove("x"));
        assert!(!files.contains("x"));
        assert!(files.load_file("x").is_err());
    }
}
