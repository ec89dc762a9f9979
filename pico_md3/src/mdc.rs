use std::{fmt, mem::size_of};

use byteorder::LE;
use tracing::{debug, debug_span};
use zerocopy::{
    byteorder::{I16, I32, U32},
    FromBytes, Unaligned,
};

use pico_model::{
    binary_utils::{count, fixed_str, offset, parse, parse_slice, read_i32},
    host::Host,
    normals::anorm,
    Error, FileType, Model, Module, ModuleInfo, Result, Validity, Vec3,
};

use crate::mesh::{
    add_surface, new_model, Frame, ShaderRecord, SurfaceData, TexCoord, Triangle, Vertex,
};

pub const MAGIC: &[u8; 4] = b"IDPC";
pub const VERSION: i32 = 2;

/// Size of one compressed offset step.
pub const DIST_SCALE: f32 = 1.0 / 20.0;
/// Bias of the compressed offsets.
pub const MAX_OFFSET: u8 = 127;

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
    ofs_tag_names: I32<LE>,
    ofs_tags: I32<LE>,
    ofs_surfaces: I32<LE>,
    ofs_end: I32<LE>,
}

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
struct TagName {
    name: [u8; 64],
}

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
struct SurfaceHeader {
    ident: [u8; 4],
    name: [u8; 64],
    flags: I32<LE>,
    num_comp_frames: I32<LE>,
    num_base_frames: I32<LE>,
    num_shaders: I32<LE>,
    num_verts: I32<LE>,
    num_triangles: I32<LE>,
    ofs_triangles: I32<LE>,
    ofs_shaders: I32<LE>,
    ofs_st: I32<LE>,
    ofs_xyz_normals: I32<LE>,
    ofs_xyz_compressed: I32<LE>,
    ofs_frame_base_frames: I32<LE>,
    ofs_frame_comp_frames: I32<LE>,
    ofs_end: I32<LE>,
}

/// A vertex offset from its base frame position, with a table normal.
#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
pub struct CompressedVertex {
    packed: U32<LE>,
}

impl CompressedVertex {
    #[must_use]
    pub fn offset(&self) -> Vec3 {
        let [x, y, z, _] = self.packed.get().to_le_bytes();
        let axis = |v: u8| (f32::from(v) - f32::from(MAX_OFFSET)) * DIST_SCALE;
        Vec3::new(axis(x), axis(y), axis(z))
    }

    #[must_use]
    pub fn normal_index(&self) -> u8 {
        self.packed.get().to_le_bytes()[3]
    }

    #[must_use]
    pub fn normal(&self) -> Vec3 {
        anorm(self.normal_index())
    }
}

/// A borrowed Return to Castle Wolfenstein model file.
pub struct Mdc<'a> {
    bytes: &'a [u8],
}

impl<'a> Mdc<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file doesn't start with the MDC magic number.
    pub fn check_signature(&self) -> Result<()> {
        match self.bytes.get(..4) {
            Some(signature) if signature == MAGIC => Ok(()),
            Some(signature) => Err(Error::InvalidSignature {
                ty: FileType::Mdc,
                signature: String::from_utf8_lossy(signature).into_owned(),
            }),
            None => Err(Error::Corrupted {
                ty: FileType::Mdc,
                error: "eof reading signature",
            }),
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a version.
    pub fn version(&self) -> Result<i32> {
        read_i32(self.bytes, 4).ok_or(Error::Corrupted {
            ty: FileType::Mdc,
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
                ty: FileType::Mdc,
                version,
            })
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a header.
    pub fn header(&self) -> Result<HeaderRef<'a>> {
        let header = parse(self.bytes, 0).ok_or(Error::Corrupted {
            ty: FileType::Mdc,
            error: "eof reading header",
        })?;

        Ok(HeaderRef {
            header,
            bytes: self.bytes,
        })
    }
}

impl fmt::Debug for Mdc<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mdc").finish_non_exhaustive()
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

    /// # Errors
    ///
    /// Returns `Err` if the frame count is negative.
    pub fn num_frames(&self) -> Result<usize> {
        count(
            self.header.num_frames.get(),
            FileType::Mdc,
            "frame count is negative",
        )
    }

    /// # Errors
    ///
    /// Returns `Err` if the frames are out of bounds.
    pub fn frames(&self) -> Result<&'a [Frame]> {
        let offset = offset(
            0,
            self.header.ofs_frames.get(),
            FileType::Mdc,
            "frame offset is negative",
        )?;

        parse_slice(self.bytes, offset, self.num_frames()?).ok_or(Error::Corrupted {
            ty: FileType::Mdc,
            error: "frames out of bounds",
        })
    }

    /// # Errors
    ///
    /// Returns `Err` if the tag names are out of bounds.
    pub fn tag_names(&self) -> Result<Vec<String>> {
        let num_tags = count(
            self.header.num_tags.get(),
            FileType::Mdc,
            "tag count is negative",
        )?;
        let offset = offset(
            0,
            self.header.ofs_tag_names.get(),
            FileType::Mdc,
            "tag name offset is negative",
        )?;

        let names: &[TagName] =
            parse_slice(self.bytes, offset, num_tags).ok_or(Error::Corrupted {
                ty: FileType::Mdc,
                error: "tag names out of bounds",
            })?;

        Ok(names.iter().map(|tag| fixed_str(&tag.name)).collect())
    }

    /// # Errors
    ///
    /// Returns `Err` if a surface header is out of bounds or has an invalid size.
    pub fn surfaces(&self) -> Result<Vec<SurfaceRef<'a>>> {
        let num_frames = self.num_frames()?;
        let num_surfaces = count(
            self.header.num_surfaces.get(),
            FileType::Mdc,
            "surface count is negative",
        )?;
        let mut surface_offset = offset(
            0,
            self.header.ofs_surfaces.get(),
            FileType::Mdc,
            "surface offset is negative",
        )?;

        let mut surfaces =
            Vec::with_capacity(num_surfaces.min(self.bytes.len() / size_of::<SurfaceHeader>()));

        for _ in 0..num_surfaces {
            let header: &SurfaceHeader =
                parse(self.bytes, surface_offset).ok_or(Error::Corrupted {
                    ty: FileType::Mdc,
                    error: "surface header out of bounds",
                })?;

            let size = count(
                header.ofs_end.get(),
                FileType::Mdc,
                "surface end offset is negative",
            )?;
            if size < size_of::<SurfaceHeader>() {
                return Err(Error::Corrupted {
                    ty: FileType::Mdc,
                    error: "surface size is too small",
                });
            }

            surfaces.push(SurfaceRef {
                header,
                offset: surface_offset,
                num_frames,
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
    num_frames: usize,
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
            FileType::Mdc,
            "surface vertex count is negative",
        )
    }

    fn slice<T: FromBytes>(
        &self,
        relative: i32,
        count: usize,
        error: &'static str,
    ) -> Result<&'a [T]> {
        let offset = offset(self.offset, relative, FileType::Mdc, error)?;
        parse_slice(self.bytes, offset, count).ok_or(Error::Corrupted {
            ty: FileType::Mdc,
            error,
        })
    }

    fn frame_slice<T: FromBytes>(
        &self,
        relative: i32,
        frame: usize,
        error: &'static str,
    ) -> Result<&'a [T]> {
        let num_vertexes = self.num_vertexes()?;
        let skip = frame
            .checked_mul(num_vertexes * size_of::<T>())
            .ok_or(Error::Corrupted {
                ty: FileType::Mdc,
                error,
            })?;
        let offset = offset(self.offset, relative, FileType::Mdc, error)?
            .checked_add(skip)
            .ok_or(Error::Corrupted {
                ty: FileType::Mdc,
                error,
            })?;

        parse_slice(self.bytes, offset, num_vertexes).ok_or(Error::Corrupted {
            ty: FileType::Mdc,
            error,
        })
    }

    /// # Errors
    ///
    /// Returns `Err` if the shaders are out of bounds.
    pub fn shaders(&self) -> Result<&'a [ShaderRecord]> {
        let num_shaders = count(
            self.header.num_shaders.get(),
            FileType::Mdc,
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
            FileType::Mdc,
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

    /// The base frame and the optional compressed frame of every model frame.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the frame tables are out of bounds.
    pub fn frame_table(&self) -> Result<Vec<(i16, Option<i16>)>> {
        let base: &[I16<LE>] = self.slice(
            self.header.ofs_frame_base_frames.get(),
            self.num_frames,
            "surface base frame table out of bounds",
        )?;
        let comp: &[I16<LE>] = self.slice(
            self.header.ofs_frame_comp_frames.get(),
            self.num_frames,
            "surface compressed frame table out of bounds",
        )?;

        Ok(base
            .iter()
            .zip(comp)
            .map(|(base, comp)| (base.get(), Some(comp.get()).filter(|&comp| comp >= 0)))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `Err` if the base frame doesn't exist or is out of bounds.
    pub fn base_vertexes(&self, base_frame: usize) -> Result<&'a [Vertex]> {
        let num_base_frames = count(
            self.header.num_base_frames.get(),
            FileType::Mdc,
            "surface base frame count is negative",
        )?;
        if base_frame >= num_base_frames {
            return Err(Error::Corrupted {
                ty: FileType::Mdc,
                error: "base frame index out of range",
            });
        }

        self.frame_slice(
            self.header.ofs_xyz_normals.get(),
            base_frame,
            "surface base vertexes out of bounds",
        )
    }

    /// # Errors
    ///
    /// Returns `Err` if the compressed frame doesn't exist or is out of bounds.
    pub fn compressed_vertexes(&self, comp_frame: usize) -> Result<&'a [CompressedVertex]> {
        let num_comp_frames = count(
            self.header.num_comp_frames.get(),
            FileType::Mdc,
            "surface compressed frame count is negative",
        )?;
        if comp_frame >= num_comp_frames {
            return Err(Error::Corrupted {
                ty: FileType::Mdc,
                error: "compressed frame index out of range",
            });
        }

        self.frame_slice(
            self.header.ofs_xyz_compressed.get(),
            comp_frame,
            "surface compressed vertexes out of bounds",
        )
    }

    /// Positions and normals of `frame`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the frame or the frames it refers to don't exist.
    pub fn vertexes(&self, frame: usize) -> Result<(Vec<Vec3>, Vec<Vec3>)> {
        let (base, comp) = *self.frame_table()?.get(frame).ok_or(Error::BadFrame {
            ty: FileType::Mdc,
            frame,
            count: self.num_frames,
        })?;

        let base = count(
            i32::from(base),
            FileType::Mdc,
            "base frame index is negative",
        )?;
        let base = self.base_vertexes(base)?;

        let Some(comp) = comp else {
            return Ok((
                base.iter().map(Vertex::position).collect(),
                base.iter().map(Vertex::normal).collect(),
            ));
        };

        debug!("frame {} uses compressed frame {}", frame, comp);

        let comp = self.compressed_vertexes(usize::from(comp.unsigned_abs()))?;

        Ok((
            base.iter()
                .zip(comp)
                .map(|(base, comp)| base.position() + comp.offset())
                .collect(),
            comp.iter().map(CompressedVertex::normal).collect(),
        ))
    }
}

/// Loads Return to Castle Wolfenstein `.mdc` models.
#[derive(Debug, Clone, Copy, Default)]
pub struct MdcModule;

impl Module for MdcModule {
    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            id: "mdc",
            ty: FileType::Mdc,
            display_name: "Return to Castle Wolfenstein",
            author: "pico contributors",
            copyright: "Copyright (c) pico contributors",
            extensions: &["mdc"],
        }
    }

    fn can_load(&self, _file_name: &str, bytes: &[u8]) -> Validity {
        let mdc = Mdc::new(bytes);

        match mdc.check_signature() {
            Ok(()) => {}
            Err(Error::InvalidSignature { .. }) => return Validity::Ident,
            Err(_) => return Validity::Size,
        }

        // a short header past a matching version is left to `load`
        match mdc.check_version() {
            Ok(_) => Validity::Ok,
            Err(Error::UnsupportedVersion { .. }) => Validity::Version,
            Err(_) => Validity::Size,
        }
    }

    fn load(&self, file_name: &str, frame: usize, bytes: &[u8], host: &Host) -> Result<Model> {
        let _span = debug_span!("mdc", file_name, frame).entered();

        let mdc = Mdc::new(bytes);
        mdc.check_signature()?;
        mdc.check_version()?;

        let header = mdc.header()?;
        let num_frames = header.num_frames()?;
        if frame >= num_frames {
            return Err(Error::BadFrame {
                ty: FileType::Mdc,
                frame,
                count: num_frames,
            });
        }

        let mut model = new_model(host, file_name, frame, num_frames)?;

        for surface in header.surfaces()? {
            let (positions, normals) = surface.vertexes(frame)?;

            add_surface(
                &mut model,
                host,
                FileType::Mdc,
                SurfaceData {
                    name: surface.name(),
                    shader_name: surface.shaders()?.first().map(ShaderRecord::name),
                    positions,
                    normals,
                    texcoords: surface.texcoords()?,
                    triangles: surface.triangles()?,
                },
            )?;
        }

        Ok(model)
    }
}
