use std::{fmt, mem::size_of};

use byteorder::LE;
use tracing::{debug, debug_span};
use zerocopy::{
    byteorder::{I32, U32},
    FromBytes, Unaligned,
};

use pico_model::{
    binary_utils::{count, fixed_str, parse, parse_mut, parse_slice_mut, read_i32},
    host::Host,
    normals::anorm,
    path, Error, FileType, Model, Module, ModuleInfo, Result, SurfaceType, Validity, Vec2, Vec3,
    WHITE,
};

pub const MAGIC: &[u8; 4] = b"IDPO";
pub const VERSION: i32 = 6;

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
struct Header {
    ident: [u8; 4],
    version: I32<LE>,
    scale: [U32<LE>; 3],
    origin: [U32<LE>; 3],
    radius: U32<LE>,
    eye_position: [U32<LE>; 3],
    num_skins: I32<LE>,
    skin_width: I32<LE>,
    skin_height: I32<LE>,
    num_verts: I32<LE>,
    num_tris: I32<LE>,
    num_frames: I32<LE>,
    sync_type: I32<LE>,
    flags: I32<LE>,
    size: U32<LE>,
}

fn float(value: U32<LE>) -> f32 {
    f32::from_bits(value.get())
}

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
pub struct TexCoord {
    onseam: I32<LE>,
    s: I32<LE>,
    t: I32<LE>,
}

impl TexCoord {
    #[must_use]
    pub fn onseam(&self) -> bool {
        self.onseam.get() != 0
    }

    #[must_use]
    pub fn st(&self) -> [i32; 2] {
        [self.s.get(), self.t.get()]
    }
}

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
pub struct Triangle {
    faces_front: I32<LE>,
    vertexes: [I32<LE>; 3],
}

impl Triangle {
    #[must_use]
    pub fn faces_front(&self) -> bool {
        self.faces_front.get() != 0
    }

    #[must_use]
    pub fn vertexes(&self) -> [i32; 3] {
        self.vertexes.map(I32::get)
    }
}

/// A packed vertex position with a normal table index.
#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
pub struct TriVertex {
    xyz: [u8; 3],
    normal: u8,
}

impl TriVertex {
    #[must_use]
    pub fn xyz(&self) -> [u8; 3] {
        self.xyz
    }

    #[must_use]
    pub fn normal_index(&self) -> u8 {
        self.normal
    }

    #[must_use]
    pub fn normal(&self) -> Vec3 {
        anorm(self.normal)
    }
}

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
struct SimpleFrameHeader {
    bbox_min: TriVertex,
    bbox_max: TriVertex,
    name: [u8; 16],
}

/// Palette indexes of one skin, or of every image of an animated skin.
#[derive(Debug, Clone, PartialEq)]
pub enum Skin<'a> {
    Single(&'a [u8]),
    Group {
        intervals: Vec<f32>,
        images: Vec<&'a [u8]>,
    },
}

impl<'a> Skin<'a> {
    /// The first image, used as the static skin.
    #[must_use]
    pub fn image(&self) -> Option<&'a [u8]> {
        match self {
            Skin::Single(image) => Some(*image),
            Skin::Group { images, .. } => images.first().copied(),
        }
    }

    #[must_use]
    pub fn images(&self) -> Vec<&'a [u8]> {
        match self {
            Skin::Single(image) => vec![*image],
            Skin::Group { images, .. } => images.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimpleFrame<'a> {
    header: &'a SimpleFrameHeader,
    vertexes: &'a [TriVertex],
    group: Option<usize>,
}

impl<'a> SimpleFrame<'a> {
    #[must_use]
    pub fn name(&self) -> String {
        fixed_str(&self.header.name)
    }

    /// Packed bounding box corners.
    #[must_use]
    pub fn bounds(&self) -> ([u8; 3], [u8; 3]) {
        (self.header.bbox_min.xyz, self.header.bbox_max.xyz)
    }

    #[must_use]
    pub fn vertexes(&self) -> &'a [TriVertex] {
        self.vertexes
    }

    /// Index of the frame group this frame came from, if any.
    #[must_use]
    pub fn group(&self) -> Option<usize> {
        self.group
    }
}

/// Everything following the header.
#[derive(Debug, Clone)]
pub struct Contents<'a> {
    pub skins: Vec<Skin<'a>>,
    pub texcoords: &'a [TexCoord],
    pub triangles: &'a [Triangle],
    /// Simple frames and group sub-frames, in file order.
    pub frames: Vec<SimpleFrame<'a>>,
}

fn corrupted(error: &'static str) -> Error {
    Error::Corrupted {
        ty: FileType::Mdl,
        error,
    }
}

/// A borrowed Quake model file.
pub struct Mdl<'a> {
    bytes: &'a [u8],
}

impl<'a> Mdl<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file doesn't start with the MDL magic number.
    pub fn check_signature(&self) -> Result<()> {
        match self.bytes.get(..4) {
            Some(signature) if signature == MAGIC => Ok(()),
            Some(signature) => Err(Error::InvalidSignature {
                ty: FileType::Mdl,
                signature: String::from_utf8_lossy(signature).into_owned(),
            }),
            None => Err(corrupted("eof reading signature")),
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a version.
    pub fn version(&self) -> Result<i32> {
        read_i32(self.bytes, 4).ok_or_else(|| corrupted("eof reading version"))
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
                ty: FileType::Mdl,
                version,
            })
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a header.
    pub fn header(&self) -> Result<HeaderRef<'a>> {
        let header = parse(self.bytes, 0).ok_or_else(|| corrupted("eof reading header"))?;

        Ok(HeaderRef {
            header,
            bytes: self.bytes,
        })
    }

    /// The palette indexed skins.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the header or any record is invalid.
    pub fn skins(&self) -> Result<Vec<Skin<'a>>> {
        Ok(self.header()?.contents()?.skins)
    }
}

impl fmt::Debug for Mdl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mdl").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeaderRef<'a> {
    header: &'a Header,
    bytes: &'a [u8],
}

impl<'a> HeaderRef<'a> {
    #[must_use]
    pub fn scale(&self) -> Vec3 {
        Vec3::from(self.header.scale.map(float))
    }

    #[must_use]
    pub fn origin(&self) -> Vec3 {
        Vec3::from(self.header.origin.map(float))
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        float(self.header.radius)
    }

    #[must_use]
    pub fn eye_position(&self) -> Vec3 {
        Vec3::from(self.header.eye_position.map(float))
    }

    #[must_use]
    pub fn sync_type(&self) -> i32 {
        self.header.sync_type.get()
    }

    #[must_use]
    pub fn flags(&self) -> i32 {
        self.header.flags.get()
    }

    #[must_use]
    pub fn size(&self) -> f32 {
        float(self.header.size)
    }

    /// # Errors
    ///
    /// Returns `Err` if either dimension isn't positive.
    pub fn skin_size(&self) -> Result<(usize, usize)> {
        let width = count(
            self.header.skin_width.get(),
            FileType::Mdl,
            "skin width is negative",
        )?;
        let height = count(
            self.header.skin_height.get(),
            FileType::Mdl,
            "skin height is negative",
        )?;

        if width == 0 || height == 0 {
            return Err(corrupted("skin size is zero"));
        }

        Ok((width, height))
    }

    /// # Errors
    ///
    /// Returns `Err` if the vertex count is negative.
    pub fn num_vertexes(&self) -> Result<usize> {
        count(
            self.header.num_verts.get(),
            FileType::Mdl,
            "vertex count is negative",
        )
    }

    /// Number of frame records, counting each group once.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the frame count is negative.
    pub fn num_frame_records(&self) -> Result<usize> {
        count(
            self.header.num_frames.get(),
            FileType::Mdl,
            "frame count is negative",
        )
    }

    /// Walks the skins, texture coordinates, triangles and frames.
    ///
    /// # Errors
    ///
    /// Returns `Err` if any record is out of bounds or has a negative count.
    pub fn contents(&self) -> Result<Contents<'a>> {
        let mut bytes = self
            .bytes
            .get(size_of::<Header>()..)
            .ok_or_else(|| corrupted("eof reading header"))?;

        let (width, height) = self.skin_size()?;
        let skin_bytes = width
            .checked_mul(height)
            .ok_or_else(|| corrupted("skin size is too large"))?;

        let num_skins = count(
            self.header.num_skins.get(),
            FileType::Mdl,
            "skin count is negative",
        )?;
        let mut skins = Vec::with_capacity(num_skins.min(bytes.len() / skin_bytes.max(1)));
        for _ in 0..num_skins {
            skins.push(read_skin(&mut bytes, skin_bytes)?);
        }

        let num_vertexes = self.num_vertexes()?;
        let texcoords = parse_slice_mut(&mut bytes, num_vertexes)
            .ok_or_else(|| corrupted("texture coordinates out of bounds"))?;

        let num_triangles = count(
            self.header.num_tris.get(),
            FileType::Mdl,
            "triangle count is negative",
        )?;
        let triangles = parse_slice_mut(&mut bytes, num_triangles)
            .ok_or_else(|| corrupted("triangles out of bounds"))?;

        let num_records = self.num_frame_records()?;
        let mut frames = Vec::with_capacity(num_records.min(bytes.len()));
        for record in 0..num_records {
            read_frame(&mut bytes, num_vertexes, record, &mut frames)?;
        }

        debug!(
            "{} skins, {} vertexes, {} triangles, {} frames in {} records",
            skins.len(),
            num_vertexes,
            num_triangles,
            frames.len(),
            num_records
        );

        Ok(Contents {
            skins,
            texcoords,
            triangles,
            frames,
        })
    }
}

fn read_type(bytes: &mut &[u8], error: &'static str) -> Result<i32> {
    parse_mut::<I32<LE>>(bytes)
        .map(|ty| ty.get())
        .ok_or_else(|| corrupted(error))
}

fn read_count(bytes: &mut &[u8], error: &'static str) -> Result<usize> {
    count(read_type(bytes, error)?, FileType::Mdl, error)
}

fn read_skin<'a>(bytes: &mut &'a [u8], skin_bytes: usize) -> Result<Skin<'a>> {
    if read_type(bytes, "eof reading skin type")? == 0 {
        let image =
            parse_slice_mut(bytes, skin_bytes).ok_or_else(|| corrupted("skin out of bounds"))?;
        return Ok(Skin::Single(image));
    }

    let num_images = read_count(bytes, "invalid skin group count")?;
    let intervals: &[U32<LE>] = parse_slice_mut(bytes, num_images)
        .ok_or_else(|| corrupted("skin group intervals out of bounds"))?;

    let images: Vec<&[u8]> = (0..num_images)
        .map(|_| parse_slice_mut(bytes, skin_bytes).ok_or_else(|| corrupted("skin out of bounds")))
        .collect::<Result<_>>()?;

    Ok(Skin::Group {
        intervals: intervals.iter().copied().map(float).collect(),
        images,
    })
}

fn read_simple_frame<'a>(
    bytes: &mut &'a [u8],
    num_vertexes: usize,
    group: Option<usize>,
) -> Result<SimpleFrame<'a>> {
    let header = parse_mut(bytes).ok_or_else(|| corrupted("frame header out of bounds"))?;
    let vertexes = parse_slice_mut(bytes, num_vertexes)
        .ok_or_else(|| corrupted("frame vertexes out of bounds"))?;

    Ok(SimpleFrame {
        header,
        vertexes,
        group,
    })
}

fn read_frame<'a>(
    bytes: &mut &'a [u8],
    num_vertexes: usize,
    record: usize,
    frames: &mut Vec<SimpleFrame<'a>>,
) -> Result<()> {
    if read_type(bytes, "eof reading frame type")? == 0 {
        frames.push(read_simple_frame(bytes, num_vertexes, None)?);
        return Ok(());
    }

    let num_frames = read_count(bytes, "invalid frame group count")?;
    let _bounds: &[TriVertex] = parse_slice_mut(bytes, 2)
        .ok_or_else(|| corrupted("frame group header out of bounds"))?;
    let _intervals: &[U32<LE>] = parse_slice_mut(bytes, num_frames)
        .ok_or_else(|| corrupted("frame group intervals out of bounds"))?;

    for _ in 0..num_frames {
        frames.push(read_simple_frame(bytes, num_vertexes, Some(record))?);
    }

    Ok(())
}

/// Loads Quake `.mdl` models.
#[derive(Debug, Clone, Copy, Default)]
pub struct MdlModule;

impl Module for MdlModule {
    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            id: "mdl",
            ty: FileType::Mdl,
            display_name: "Quake",
            author: "pico contributors",
            copyright: "Copyright (c) pico contributors",
            extensions: &["mdl"],
        }
    }

    fn can_load(&self, _file_name: &str, bytes: &[u8]) -> Validity {
        let mdl = Mdl::new(bytes);

        match mdl.check_signature() {
            Ok(()) => {}
            Err(Error::InvalidSignature { .. }) => return Validity::Ident,
            Err(_) => return Validity::Size,
        }

        // a short header past a matching version is left to `load`
        match mdl.check_version() {
            Ok(_) => Validity::Ok,
            Err(Error::UnsupportedVersion { .. }) => Validity::Version,
            Err(_) => Validity::Size,
        }
    }

    fn load(&self, file_name: &str, frame: usize, bytes: &[u8], host: &Host) -> Result<Model> {
        let _span = debug_span!("mdl", file_name, frame).entered();

        let mdl = Mdl::new(bytes);
        mdl.check_signature()?;
        mdl.check_version()?;

        let header = mdl.header()?;
        let contents = header.contents()?;

        let selected = *contents.frames.get(frame).ok_or(Error::BadFrame {
            ty: FileType::Mdl,
            frame,
            count: contents.frames.len(),
        })?;

        let mut model = Model::with_allocator(host.allocator())?;
        model.set_name(path::file_stem(file_name));
        model.set_file_name(file_name);
        model.set_frame_num(frame);
        model.set_num_frames(contents.frames.len());

        let skin_name = format!("{}_img", path::strip_extension(file_name));
        let shader = model.new_shader()?;
        let shader_ref = model
            .shader_mut(shader.index())
            .ok_or(Error::InvalidModel("new shader is missing"))?;
        shader_ref.set_name(skin_name.clone());
        shader_ref.set_map_name(skin_name);

        let id = model.new_surface()?;
        model.set_surface_shader(id, Some(shader))?;
        let surface_name = model.name().to_owned();

        let (width, height) = header.skin_size()?;
        let half_width =
            i32::try_from(width / 2).map_err(|_| corrupted("skin width is too large"))?;
        let (width, height) = (width as f32, height as f32);
        let scale = header.scale();
        let origin = header.origin();

        let surface = model
            .surface_mut(id.index())
            .ok_or(Error::InvalidModel("new surface is missing"))?;
        surface.set_type(SurfaceType::Triangles);
        surface.set_name(surface_name);

        let num_corners = contents.triangles.len() * 3;
        surface.adjust(num_corners, 1, 1, num_corners, 0)?;

        let corners = contents.triangles.iter().flat_map(|triangle| {
            triangle
                .vertexes()
                .map(|vertex| (triangle.faces_front(), vertex))
        });

        for (i, (faces_front, vertex)) in corners.enumerate() {
            let vertex = usize::try_from(vertex)
                .ok()
                .filter(|&vertex| vertex < selected.vertexes.len())
                .ok_or_else(|| corrupted("triangle vertex index out of range"))?;

            let position = &selected.vertexes[vertex];
            let [x, y, z] = position.xyz.map(f32::from);
            surface.set_xyz(i, origin + scale * Vec3::new(x, y, z))?;
            surface.set_normal(i, position.normal())?;

            let texcoord = &contents.texcoords[vertex];
            let [mut s, t] = texcoord.st();
            if texcoord.onseam() && !faces_front {
                s = s.saturating_add(half_width);
            }
            surface.set_st(
                0,
                i,
                Vec2::new((s as f32 + 0.5) / width, (t as f32 + 0.5) / height),
            )?;
            surface.set_color(0, i, WHITE)?;
            surface.set_index(i, i as u32)?;
        }

        debug!(
            "frame `{}`: {} corners from {} triangles",
            selected.name(),
            num_corners,
            contents.triangles.len()
        );

        Ok(model)
    }
}
