#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Loads vertex animated models from the id Tech family of games.
//!
//! ```no_run
//! pico_core::set_file_loader(pico_core::host::StdFileLoader);
//!
//! let model = pico_core::load_model("models/player.md3", 0)?;
//! for surface in model.surfaces() {
//!     println!("{}: {} vertexes", surface.name(), surface.num_vertexes());
//! }
//! # Ok::<(), pico_core::Error>(())
//! ```

mod global;
pub mod loader;

pub use pico_host as host;
pub use pico_md3 as md3;
pub use pico_mdl as mdl;
pub use pico_model as model;

pub use global::{
    host, reset_host, set_allocator, set_file_loader, set_file_releaser, set_print_level,
    set_print_sink,
};
pub use loader::{
    find_module_by_extension, load_model, load_model_from_bytes, load_model_with, modules,
};
pub use pico_model::{
    Error, ErrorKind, Model, Module, ModuleInfo, Result, Shader, Surface, SurfaceType,
};
