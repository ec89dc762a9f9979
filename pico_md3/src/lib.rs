#![warn(clippy::all, clippy::pedantic)]
// offsets and counts come from i32 file fields
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

//! Loaders for the id Tech 3 vertex animated model formats.
//!
//! [`Md3Module`] reads Quake III `.md3` files and [`MdcModule`] reads the
//! compressed `.mdc` variant used by Return to Castle Wolfenstein. Both only
//! ever decode a single animation frame into a [`pico_model::Model`].

mod mesh;

pub mod md3;
pub mod mdc;

pub use md3::{Md3, Md3Module, Tag};
pub use mdc::{CompressedVertex, Mdc, MdcModule};
pub use mesh::{Frame, ShaderRecord, TexCoord, Triangle, Vertex, XYZ_SCALE};
