use pico_host::Host;

use crate::{FileType, Model, Result};

/// Describes a format module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleInfo {
    /// Short identifier, e.g. `md3`.
    pub id: &'static str,
    pub ty: FileType,
    pub display_name: &'static str,
    pub author: &'static str,
    pub copyright: &'static str,
    /// Default file extensions, without the dot.
    pub extensions: &'static [&'static str],
}

impl ModuleInfo {
    /// Whether `extension` is one of the module's defaults, ignoring ASCII case.
    #[must_use]
    pub fn handles_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(extension))
    }
}

/// Result of sniffing a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Validity {
    /// The module can load the buffer.
    Ok,
    /// The buffer is too small to hold a magic number and version.
    Size,
    /// The magic number doesn't match.
    Ident,
    /// The magic number matches but the version isn't supported.
    Version,
}

/// A model format decoder.
pub trait Module: Sync {
    fn info(&self) -> ModuleInfo;

    /// Inspects the start of `bytes` without decoding anything.
    fn can_load(&self, file_name: &str, bytes: &[u8]) -> Validity;

    /// Decodes `frame` of the file into a new model.
    ///
    /// The model's storage is accounted through the host's allocator, and
    /// non-fatal problems are reported to its print sink.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file is malformed, the frame doesn't exist or
    /// allocation fails.
    fn load(&self, file_name: &str, frame: usize, bytes: &[u8], host: &Host) -> Result<Model>;
}
