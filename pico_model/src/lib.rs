#![warn(clippy::all, clippy::pedantic)]
// counts and offsets come from i32 file fields
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

//! The common model representation every loader decodes into.
//!
//! A [`Model`] owns its [`Shader`]s and [`Surface`]s. Surfaces refer to shaders
//! by [`ShaderId`]. All storage grows in fixed blocks through [`GrowArray`],
//! which keeps capacity and live count apart so that counts can be reset
//! without giving memory back.

pub mod binary_utils;
pub mod grow;
pub mod normals;
pub mod path;

mod model;
mod module;
mod shader;
mod surface;

use std::{
    fmt::{self, Display},
    result,
};

use thiserror::Error;

pub use grow::{
    GrowArray, GROW_ARRAYS, GROW_FACES, GROW_INDEXES, GROW_SHADERS, GROW_SURFACES,
    GROW_VERTEXES,
};
pub use model::{Model, TriangleVertex};
pub use module::{Module, ModuleInfo, Validity};
pub use shader::{Shader, ShaderId};
pub use surface::{Surface, SurfaceId, SurfaceType};

pub use glam::{Vec2, Vec3};
pub use pico_host as host;
pub use rgb::RGBA8;

/// Opaque white, the colour given to vertices of formats without vertex colours.
pub const WHITE: RGBA8 = RGBA8 {
    r: 255,
    g: 255,
    b: 255,
    a: 255,
};

#[derive(Debug, Clone, Error, Hash, PartialEq, Eq)]
pub enum Error {
    #[error("no file loader installed")]
    NoFileLoader,
    #[error("io error reading `{path}`: {error}")]
    Io { path: String, error: String },
    #[error("`{0}` is not in a supported model format")]
    UnknownFormat(String),
    #[error("not a {ty} file: invalid signature `{signature}`")]
    InvalidSignature { ty: FileType, signature: String },
    #[error("unsupported {ty} version {version}")]
    UnsupportedVersion { ty: FileType, version: i32 },
    #[error("{ty} corrupted: {error}")]
    Corrupted { ty: FileType, error: &'static str },
    #[error("{ty} frame {frame} out of range, the model has {count} frames")]
    BadFrame {
        ty: FileType,
        frame: usize,
        count: usize,
    },
    #[error("invalid model: {0}")]
    InvalidModel(&'static str),
    #[error("out of memory")]
    OutOfMemory,
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ErrorKind {
    /// The host isn't set up to load files.
    Config,
    /// The host failed to provide the file.
    Io,
    /// No loader recognised the file.
    UnknownFormat,
    /// A loader recognised the file but its contents are invalid.
    Malformed,
    /// The requested frame doesn't exist.
    BadFrame,
    /// An allocation was refused or failed.
    OutOfMemory,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoFileLoader => ErrorKind::Config,
            Error::Io { .. } => ErrorKind::Io,
            Error::UnknownFormat(_) => ErrorKind::UnknownFormat,
            Error::InvalidSignature { .. }
            | Error::UnsupportedVersion { .. }
            | Error::Corrupted { .. }
            | Error::InvalidModel(_) => ErrorKind::Malformed,
            Error::BadFrame { .. } => ErrorKind::BadFrame,
            Error::OutOfMemory => ErrorKind::OutOfMemory,
        }
    }
}

impl From<host::LoadFileError> for Error {
    fn from(err: host::LoadFileError) -> Self {
        match err {
            host::LoadFileError::NoLoader => Error::NoFileLoader,
            host::LoadFileError::Io { path, error } => Error::Io {
                path,
                error: error.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum FileType {
    Md3,
    Mdc,
    Mdl,
}

impl Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileType::Md3 => "md3",
            FileType::Mdc => "mdc",
            FileType::Mdl => "mdl",
        })
    }
}

pub type Result<T> = result::Result<T, Error>;
