//! The process-wide host used by [`crate::load_model`].

use std::sync::RwLock;

use pico_host::{Allocator, FileLoader, FileReleaser, Host, PrintLevel, PrintSink};

static HOST: RwLock<Option<Host>> = RwLock::new(None);

fn update(f: impl FnOnce(&mut Host)) {
    let mut host = HOST.write().expect("the lock shouldn't be poisoned");
    f(host.get_or_insert_with(Host::new));
}

/// A snapshot of the global host.
///
/// Until something is installed this is [`Host::new`]: no file loader, the
/// system allocator and diagnostics forwarded to `tracing`.
#[must_use]
pub fn host() -> Host {
    HOST.read()
        .expect("the lock shouldn't be poisoned")
        .clone()
        .unwrap_or_default()
}

pub fn set_allocator(allocator: impl Allocator + 'static) {
    update(|host| host.set_allocator(allocator));
}

pub fn set_file_loader(file_loader: impl FileLoader + 'static) {
    update(|host| host.set_file_loader(file_loader));
}

pub fn set_file_releaser(file_releaser: impl FileReleaser + 'static) {
    update(|host| host.set_file_releaser(file_releaser));
}

pub fn set_print_sink(print_sink: impl PrintSink + 'static) {
    update(|host| host.set_print_sink(print_sink));
}

pub fn set_print_level(print_level: PrintLevel) {
    update(|host| host.set_print_level(print_level));
}

/// Restores every global callback to its default.
pub fn reset_host() {
    *HOST.write().expect("the lock shouldn't be poisoned") = None;
}
