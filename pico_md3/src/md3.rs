use std::{fmt, mem::size_of};

use byteorder::LE;
use tracing::debug_span;
use zerocopy::{
    byteorder::{I32, U32},
    FromBytes, Unaligned,
};

use pico_model::{
    binary_utils::{count, fixed_str, offset, parse, parse_slice, read_i32},
    host::Host,
    Error, FileType, Model, Module, ModuleInfo, Result, Validity, Vec3,
};

use crate::mesh::{
    add_surface, new_model, Frame, ShaderRecord, SurfaceData, TexCoord, Triangle, Vertex,
};

pub const MAGIC: &[u8; 4] = b"IDP3";
pub const VERSION: i32 = 15;

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
struct Header {
    ident: [u8; 4],
    version: I32<LE>,
    name: [u8; 64],
    flags: I32<LE>,
    num_frames: I32<LE>,
    num_tags: I32<LE>,
    num_surfaces: I32<LE>,
    num_skins: I32<LE>,
    ofs_frames: I32<LE>,
    ofs_tags: I32<LE>,
    ofs_surfaces: I32<LE>,
    ofs_end: I32<LE>,
}

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
pub struct Tag {
    name: [u8; 64],
    origin: [U32<LE>; 3],
    axis: [[U32<LE>; 3]; 3],
}

fn float(value: U32<LE>) -> f32 {
    f32::from_bits(value.get())
}

impl Tag {
    #[must_use]
    pub fn name(&self) -> String {
        fixed_str(&self.name)
    }

    #[must_use]
    pub fn origin(&self) -> Vec3 {
        Vec3::from(self.origin.map(float))
    }

    #[must_use]
    pub fn axis(&self) -> [Vec3; 3] {
        self.axis.map(|row| Vec3::from(row.map(float)))
    }
}

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
struct SurfaceHeader {
    ident: [u8; 4],
    name: [u8; 64],
    flags: I32<LE>,
    num_frames: I32<LE>,
    num_shaders: I32<LE>,
    num_verts: I32<LE>,
    num_triangles: I32<LE>,
    ofs_triangles: I32<LE>,
    ofs_shaders: I32<LE>,
    ofs_st: I32<LE>,
    ofs_xyz_normals: I32<LE>,
    ofs_end: I32<LE>,
}

/// A borrowed Quake III model file.
pub struct Md3<'a> {
    bytes: &'a [u8],
}

impl<'a> Md3<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file doesn't start with the MD3 magic number.
    pub fn check_signature(&self) -> Result<()> {
        match self.bytes.get(..4) {
            Some(signature) if signature == MAGIC => Ok(()),
            Some(signature) => Err(Error::InvalidSignature {
                ty: FileType::Md3,
                signature: String::from_utf8_lossy(signature).into_owned(),
            }),
            None => Err(Error::Corrupted {
                ty: FileType::Md3,
                error: "eof reading signature",
            }),
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a version.
    pub fn version(&self) -> Result<i32> {
        read_i32(self.bytes, 4).ok_or(Error::Corrupted {
            ty: FileType::Md3,
            error: "eof reading version",
        })
    }

    /// # Errors
    ///
    /// Returns `Err` if the version isn't supported.
    pub fn check_version(&self) -> Result<i32> {
        let version = self.version()?;

        if version == VERSION {
            Ok(version)
        } else {
            Err(Error::UnsupportedVersion {
                ty: FileType::Md3,
                version,
            })
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a header.
    pub fn header(&self) -> Result<HeaderRef<'a>> {
        let header = parse(self.bytes, 0).ok_or(Error::Corrupted {
            ty: FileType::Md3,
            error: "eof reading header",
        })?;

        Ok(HeaderRef {
            header,
            bytes: self.bytes,
        })
    }
}

impl fmt::Debug for Md3<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Md3").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeaderRef<'a> {
    header: &'a Header,
    bytes: &'a [u8],
}

impl<'a> HeaderRef<'a> {
    #[must_use]
    pub fn name(&self) -> String {
        fixed_str(&self.header.name)
    }

    #[must_use]
    pub fn flags(&self) -> i32 {
        self.header.flags.get()
    }

    /// # Errors
    ///
    /// Returns `Err` if the frame count is negative.
    pub fn num_frames(&self) -> Result<usize> {
        count(
            self.header.num_frames.get(),
            FileType::Md3,
            "frame count is negative",
        )
    }

    /// # Errors
    ///
    /// Returns `Err` if the skin count is negative.
    pub fn num_skins(&self) -> Result<usize> {
        count(
            self.header.num_skins.get(),
            FileType::Md3,
            "skin count is negative",
        )
    }

    /// # Errors
    ///
    /// Returns `Err` if the frames are out of bounds.
    pub fn frames(&self) -> Result<&'a [Frame]> {
        let offset = offset(
            0,
            self.header.ofs_frames.get(),
            FileType::Md3,
            "frame offset is negative",
        )?;

        parse_slice(self.bytes, offset, self.num_frames()?).ok_or(Error::Corrupted {
            ty: FileType::Md3,
            error: "frames out of bounds",
        })
    }

    /// The attachment tags of `frame`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the frame doesn't exist or the tags are out of bounds.
    pub fn tags(&self, frame: usize) -> Result<&'a [Tag]> {
        let num_frames = self.num_frames()?;
        if frame >= num_frames {
            return Err(Error::BadFrame {
                ty: FileType::Md3,
                frame,
                count: num_frames,
            });
        }

        let num_tags = count(
            self.header.num_tags.get(),
            FileType::Md3,
            "tag count is negative",
        )?;
        let offset = frame
            .checked_mul(num_tags * size_of::<Tag>())
            .and_then(|skip| {
                offset(0, self.header.ofs_tags.get(), FileType::Md3, "")
                    .ok()?
                    .checked_add(skip)
            })
            .ok_or(Error::Corrupted {
                ty: FileType::Md3,
                error: "tag offset is invalid",
            })?;

        parse_slice(self.bytes, offset, num_tags).ok_or(Error::Corrupted {
            ty: FileType::Md3,
            error: "tags out of bounds",
        })
    }

    /// # Errors
    ///
    /// Returns `Err` if a surface header is out of bounds or has an invalid size.
    pub fn surfaces(&self) -> Result<Vec<SurfaceRef<'a>>> {
        let num_surfaces = count(
            self.header.num_surfaces.get(),
            FileType::Md3,
            "surface count is negative",
        )?;
        let mut surface_offset = offset(
            0,
            self.header.ofs_surfaces.get(),
            FileType::Md3,
            "surface offset is negative",
        )?;

        let mut surfaces =
            Vec::with_capacity(num_surfaces.min(self.bytes.len() / size_of::<SurfaceHeader>()));

        for _ in 0..num_surfaces {
            let header: &SurfaceHeader =
                parse(self.bytes, surface_offset).ok_or(Error::Corrupted {
                    ty: FileType::Md3,
                    error: "surface header out of bounds",
                })?;

            let size = count(
                header.ofs_end.get(),
                FileType::Md3,
                "surface end offset is negative",
            )?;
            if size < size_of::<SurfaceHeader>() {
                return Err(Error::Corrupted {
                    ty: FileType::Md3,
                    error: "surface size is too small",
                });
            }

            surfaces.push(SurfaceRef {
                header,
                offset: surface_offset,
                bytes: self.bytes,
            });

            surface_offset += size;
        }

        Ok(surfaces)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SurfaceRef<'a> {
    header: &'a SurfaceHeader,
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> SurfaceRef<'a> {
    #[must_use]
    pub fn name(&self) -> String {
        fixed_str(&self.header.name)
    }

    /// # Errors
    ///
    /// Returns `Err` if the vertex count is negative.
    pub fn num_vertexes(&self) -> Result<usize> {
        count(
            self.header.num_verts.get(),
            FileType::Md3,
            "surface vertex count is negative",
        )
    }

    fn slice<T: FromBytes>(
        &self,
        relative: i32,
        count: usize,
        error: &'static str,
    ) -> Result<&'a [T]> {
        let offset = offset(self.offset, relative, FileType::Md3, error)?;
        parse_slice(self.bytes, offset, count).ok_or(Error::Corrupted {
            ty: FileType::Md3,
            error,
        })
    }

    /// # Errors
    ///
    /// Returns `Err` if the shaders are out of bounds.
    pub fn shaders(&self) -> Result<&'a [ShaderRecord]> {
        let num_shaders = count(
            self.header.num_shaders.get(),
            FileType::Md3,
            "surface shader count is negative",
        )?;
        self.slice(
            self.header.ofs_shaders.get(),
            num_shaders,
            "surface shaders out of bounds",
        )
    }

    /// # Errors
    ///
    /// Returns `Err` if the triangles are out of bounds.
    pub fn triangles(&self) -> Result<&'a [Triangle]> {
        let num_triangles = count(
            self.header.num_triangles.get(),
            FileType::Md3,
            "surface triangle count is negative",
        )?;
        self.slice(
            self.header.ofs_triangles.get(),
            num_triangles,
            "surface triangles out of bounds",
        )
    }

    /// # Errors
    ///
    /// Returns `Err` if the texture coordinates are out of bounds.
    pub fn texcoords(&self) -> Result<&'a [TexCoord]> {
        self.slice(
            self.header.ofs_st.get(),
            self.num_vertexes()?,
            "surface texture coordinates out of bounds",
        )
    }

    /// The vertexes of `frame`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the surface doesn't have the frame or the vertexes are out of bounds.
    pub fn vertexes(&self, frame: usize) -> Result<&'a [Vertex]> {
        let num_frames = count(
            self.header.num_frames.get(),
            FileType::Md3,
            "surface frame count is negative",
        )?;
        if frame >= num_frames {
            return Err(Error::Corrupted {
                ty: FileType::Md3,
                error: "surface has fewer frames than the model",
            });
        }

        let num_vertexes = self.num_vertexes()?;
        let total = num_frames
            .checked_mul(num_vertexes)
            .ok_or(Error::Corrupted {
                ty: FileType::Md3,
                error: "surface vertex count is too large",
            })?;
        let all = self.slice::<Vertex>(
            self.header.ofs_xyz_normals.get(),
            total,
            "surface vertexes out of bounds",
        )?;

        Ok(&all[frame * num_vertexes..(frame + 1) * num_vertexes])
    }
}

/// Loads Quake III `.md3` models.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md3Module;

impl Module for Md3Module {
    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            id: "md3",
            ty: FileType::Md3,
            display_name: "Quake III Arena",
            author: "pico contributors",
            copyright: "Copyright (c) pico contributors",
            extensions: &["md3"],
        }
    }

    fn can_load(&self, _file_name: &str, bytes: &[u8]) -> Validity {
        let md3 = Md3::new(bytes);

        match md3.check_signature() {
            Ok(()) => {}
            Err(Error::InvalidSignature { .. }) => return Validity::Ident,
            Err(_) => return Validity::Size,
        }

        // a short header past a matching version is left to `load`
        match md3.check_version() {
            Ok(_) => Validity::Ok,
            Err(Error::UnsupportedVersion { .. }) => Validity::Version,
            Err(_) => Validity::Size,
        }
    }

    fn load(&self, file_name: &str, frame: usize, bytes: &[u8], host: &Host) -> Result<Model> {
        let _span = debug_span!("md3", file_name, frame).entered();

        let md3 = Md3::new(bytes);
        md3.check_signature()?;
        md3.check_version()?;

        let header = md3.header()?;
        let num_frames = header.num_frames()?;
        if frame >= num_frames {
            return Err(Error::BadFrame {
                ty: FileType::Md3,
                frame,
                count: num_frames,
            });
        }

        let mut model = new_model(host, file_name, frame, num_frames)?;

        for surface in header.surfaces()? {
            let vertexes = surface.vertexes(frame)?;

            add_surface(
                &mut model,
                host,
                FileType::Md3,
                SurfaceData {
                    name: surface.name(),
                    shader_name: surface.shaders()?.first().map(ShaderRecord::name),
                    positions: vertexes.iter().map(Vertex::position).collect(),
                    normals: vertexes.iter().map(Vertex::normal).collect(),
                    texcoords: surface.texcoords()?,
                    triangles: surface.triangles()?,
                },
            )?;
        }

        Ok(model)
    }
}
