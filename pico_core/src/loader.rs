//! Picks the module that understands a file and runs it.

use tracing::{debug, debug_span};

use pico_host::{Host, PrintLevel};
use pico_md3::{Md3Module, MdcModule};
use pico_mdl::MdlModule;
use pico_model::{binary_utils::read_i32, Error, ErrorKind, Model, Module, Result, Validity};

static MODULES: [&dyn Module; 3] = [&Md3Module, &MdcModule, &MdlModule];

/// Every registered module, in the order files are sniffed.
#[must_use]
pub fn modules() -> &'static [&'static dyn Module] {
    &MODULES
}

/// The first module that lists `extension` among its defaults.
/// A leading dot and ASCII case are ignored.
#[must_use]
pub fn find_module_by_extension(extension: &str) -> Option<&'static dyn Module> {
    let extension = extension.strip_prefix('.').unwrap_or(extension);

    modules()
        .iter()
        .copied()
        .find(|module| module.info().handles_extension(extension))
}

/// Loads `frame` of the model at `path` through the global host.
///
/// # Errors
///
/// Returns `Err` if no file loader is installed, the file can't be loaded,
/// no module recognises it or decoding fails.
pub fn load_model(path: &str, frame: usize) -> Result<Model> {
    load_model_with(&crate::host(), path, frame)
}

/// Loads `frame` of the model at `path` through `host`.
///
/// The file buffer is handed back to the host's releaser before this returns,
/// whether decoding succeeded or not.
///
/// # Errors
///
/// See [`load_model`].
pub fn load_model_with(host: &Host, path: &str, frame: usize) -> Result<Model> {
    let _span = debug_span!("load_model", path, frame).entered();

    let file = host
        .load_file(path)
        .map_err(|err| report(host, path, Error::from(err)))?;

    dispatch(host, path, &file, frame).map_err(|err| report(host, path, err))
}

/// Loads `frame` of a model already in memory, without touching the file loader.
/// `name` is used for sniffing, naming the model and diagnostics.
///
/// # Errors
///
/// Returns `Err` if no module recognises the buffer or decoding fails.
pub fn load_model_from_bytes(
    host: &Host,
    name: &str,
    bytes: &[u8],
    frame: usize,
) -> Result<Model> {
    let _span = debug_span!("load_model_from_bytes", name, frame).entered();

    dispatch(host, name, bytes, frame).map_err(|err| report(host, name, err))
}

fn dispatch(host: &Host, name: &str, bytes: &[u8], frame: usize) -> Result<Model> {
    let mut rejected_version = None;

    for module in modules() {
        let info = module.info();

        match module.can_load(name, bytes) {
            Validity::Ok => {
                debug!("`{}` is {}", name, info.display_name);

                let mut model = module.load(name, frame, bytes, host)?;
                model.set_module(info);
                model.verify()?;

                return Ok(model);
            }
            Validity::Version => {
                debug!("`{}` has an unsupported {} version", name, info.id);
                rejected_version.get_or_insert(info.ty);
            }
            Validity::Ident | Validity::Size => {}
        }
    }

    match (rejected_version, read_i32(bytes, 4)) {
        (Some(ty), Some(version)) => Err(Error::UnsupportedVersion { ty, version }),
        _ => Err(Error::UnknownFormat(name.to_owned())),
    }
}

fn report(host: &Host, name: &str, err: Error) -> Error {
    let message = format!("failed to load `{}`: {}", name, err);

    match err.kind() {
        ErrorKind::Config | ErrorKind::Io | ErrorKind::Malformed => {
            host.print(PrintLevel::Error, &message);
        }
        ErrorKind::UnknownFormat | ErrorKind::BadFrame => {
            host.print(PrintLevel::Warning, &message);
        }
        ErrorKind::OutOfMemory => {
            host.print(PrintLevel::Error, &message);
            host.print(PrintLevel::Fatal, "out of memory");
        }
    }

    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_order() {
        let ids = modules()
            .iter()
            .map(|module| module.info().id)
            .collect::<Vec<_>>();
        assert_eq!(ids, ["md3", "mdc", "mdl"]);
    }

    #[test]
    fn by_extension() {
        assert_eq!(find_module_by_extension("MD3").unwrap().info().id, "md3");
        assert_eq!(find_module_by_extension(".mdc").unwrap().info().id, "mdc");
        assert_eq!(find_module_by_extension("mdl").unwrap().info().id, "mdl");
        assert!(find_module_by_extension("obj").is_none());
    }

    #[test]
    fn empty_buffer() {
        assert_eq!(
            dispatch(&Host::new(), "empty.md3", &[], 0).unwrap_err(),
            Error::UnknownFormat(String::from("empty.md3"))
        );
    }
}
