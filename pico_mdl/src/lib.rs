#![warn(clippy::all, clippy::pedantic)]
// counts come from i32 file fields
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

//! Quake `.mdl` model loader.

pub mod mdl;
pub mod skin;

pub use mdl::{Contents, Mdl, MdlModule, SimpleFrame, Skin, TexCoord, Triangle, TriVertex};
pub use skin::Palette;
