//! Writers for synthetic model files.

use byteorder::{ByteOrder, WriteBytesExt, LE};

#[derive(Debug, Default)]
struct Writer {
    bytes: Vec<u8>,
}

const WRITE: &str = "writing to a vec can't fail";

impl Writer {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn u8(&mut self, value: u8) {
        self.bytes.write_u8(value).expect(WRITE);
    }

    fn i16(&mut self, value: i16) {
        self.bytes.write_i16::<LE>(value).expect(WRITE);
    }

    fn i32(&mut self, value: i32) {
        self.bytes.write_i32::<LE>(value).expect(WRITE);
    }

    fn u32(&mut self, value: u32) {
        self.bytes.write_u32::<LE>(value).expect(WRITE);
    }

    fn f32(&mut self, value: f32) {
        self.bytes.write_f32::<LE>(value).expect(WRITE);
    }

    fn vec3(&mut self, value: [f32; 3]) {
        for v in value {
            self.f32(v);
        }
    }

    fn name(&mut self, name: &str, len: usize) {
        let mut field = vec![0; len];
        let bytes = name.as_bytes();
        let n = bytes.len().min(len - 1);
        field[..n].copy_from_slice(&bytes[..n]);
        self.raw(&field);
    }

    fn offset(&self) -> i32 {
        self.len().try_into().expect("test files are small")
    }

    /// Overwrites the `i32` at `at`.
    fn patch(&mut self, at: usize, value: i32) {
        LE::write_i32(&mut self.bytes[at..at + 4], value);
    }

    /// Overwrites the `i32` at `at` with the current length relative to `base`.
    fn patch_here(&mut self, at: usize, base: usize) {
        let value = (self.len() - base).try_into().expect("test files are small");
        self.patch(at, value);
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

fn count(n: usize) -> i32 {
    n.try_into().expect("test files are small")
}

/// An MD3 style vertex: fixed point position and two normal angles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Md3Vertex {
    pub xyz: [i16; 3],
    pub lat: u8,
    pub lng: u8,
}

impl Md3Vertex {
    #[must_use]
    pub fn new(xyz: [i16; 3], lat: u8, lng: u8) -> Self {
        Self { xyz, lat, lng }
    }

    fn write(self, w: &mut Writer) {
        for v in self.xyz {
            w.i16(v);
        }
        w.u8(self.lat);
        w.u8(self.lng);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Md3Tag {
    pub name: String,
    pub origin: [f32; 3],
}

#[derive(Debug, Clone, Default)]
pub struct Md3Surface {
    pub name: String,
    pub shaders: Vec<String>,
    /// Vertexes of every frame.
    pub frames: Vec<Vec<Md3Vertex>>,
    pub st: Vec<[f32; 2]>,
    pub triangles: Vec<[i32; 3]>,
}

#[derive(Debug, Clone, Default)]
pub struct Md3File {
    pub name: String,
    pub version: Option<i32>,
    pub num_frames: usize,
    pub tags: Vec<Md3Tag>,
    pub surfaces: Vec<Md3Surface>,
}

fn write_frames(w: &mut Writer, num_frames: usize) {
    for i in 0..num_frames {
        w.vec3([0.0; 3]);
        w.vec3([0.0; 3]);
        w.vec3([0.0; 3]);
        w.f32(0.0);
        w.name(&format!("frame{}", i), 16);
    }
}

fn write_shaders(w: &mut Writer, shaders: &[String]) {
    for (i, shader) in shaders.iter().enumerate() {
        w.name(shader, 64);
        w.i32(count(i));
    }
}

fn write_triangles(w: &mut Writer, triangles: &[[i32; 3]]) {
    for triangle in triangles {
        for &index in triangle {
            w.i32(index);
        }
    }
}

fn write_st(w: &mut Writer, st: &[[f32; 2]]) {
    for &[s, t] in st {
        w.f32(s);
        w.f32(t);
    }
}

impl Md3File {
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::default();

        w.raw(b"IDP3");
        w.i32(self.version.unwrap_or(15));
        w.name(&self.name, 64);
        w.i32(0);
        w.i32(count(self.num_frames));
        w.i32(count(self.tags.len()));
        w.i32(count(self.surfaces.len()));
        w.i32(0);
        let ofs_frames = w.len();
        w.i32(0);
        w.i32(0);
        w.i32(0);
        w.i32(0);

        w.patch_here(ofs_frames, 0);
        write_frames(&mut w, self.num_frames);

        w.patch_here(ofs_frames + 4, 0);
        for _ in 0..self.num_frames {
            for tag in &self.tags {
                w.name(&tag.name, 64);
                w.vec3(tag.origin);
                w.vec3([1.0, 0.0, 0.0]);
                w.vec3([0.0, 1.0, 0.0]);
                w.vec3([0.0, 0.0, 1.0]);
            }
        }

        w.patch_here(ofs_frames + 8, 0);
        for surface in &self.surfaces {
            let start = w.len();
            let num_verts = surface.frames.first().map_or(surface.st.len(), Vec::len);

            w.raw(b"IDP3");
            w.name(&surface.name, 64);
            w.i32(0);
            w.i32(count(surface.frames.len()));
            w.i32(count(surface.shaders.len()));
            w.i32(count(num_verts));
            w.i32(count(surface.triangles.len()));
            let offsets = w.len();
            for _ in 0..5 {
                w.i32(0);
            }

            w.patch_here(offsets + 4, start);
            write_shaders(&mut w, &surface.shaders);
            w.patch_here(offsets, start);
            write_triangles(&mut w, &surface.triangles);
            w.patch_here(offsets + 8, start);
            write_st(&mut w, &surface.st);
            w.patch_here(offsets + 12, start);
            for vertex in surface.frames.iter().flatten() {
                vertex.write(&mut w);
            }
            w.patch_here(offsets + 16, start);
        }

        w.patch_here(ofs_frames + 12, 0);
        w.into_bytes()
    }
}

/// A compressed MDC vertex delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MdcDelta {
    /// Per axis offsets biased by 127, in units of 1/20.
    pub offset: [u8; 3],
    /// Index into the 256 entry normal table.
    pub normal: u8,
}

impl MdcDelta {
    /// A delta moving by whole twentieths, `[0, 0, 0]` being no movement.
    #[must_use]
    pub fn new(steps: [i8; 3], normal: u8) -> Self {
        Self {
            offset: steps.map(|s| (i16::from(s) + 127).try_into().expect("step in range")),
            normal,
        }
    }

    fn packed(self) -> u32 {
        u32::from(self.offset[0])
            | u32::from(self.offset[1]) << 8
            | u32::from(self.offset[2]) << 16
            | u32::from(self.normal) << 24
    }
}

#[derive(Debug, Clone, Default)]
pub struct MdcSurface {
    pub name: String,
    pub shaders: Vec<String>,
    pub base_frames: Vec<Vec<Md3Vertex>>,
    pub comp_frames: Vec<Vec<MdcDelta>>,
    /// Base frame of every model frame.
    pub frame_base: Vec<i16>,
    /// Compressed frame of every model frame, `-1` for none.
    pub frame_comp: Vec<i16>,
    pub st: Vec<[f32; 2]>,
    pub triangles: Vec<[i32; 3]>,
}

#[derive(Debug, Clone, Default)]
pub struct MdcFile {
    pub name: String,
    pub version: Option<i32>,
    pub num_frames: usize,
    pub tag_names: Vec<String>,
    pub surfaces: Vec<MdcSurface>,
}

impl MdcFile {
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::default();

        w.raw(b"IDPC");
        w.i32(self.version.unwrap_or(2));
        w.name(&self.name, 64);
        w.i32(0);
        w.i32(count(self.num_frames));
        w.i32(count(self.tag_names.len()));
        w.i32(count(self.surfaces.len()));
        w.i32(0);
        let ofs_frames = w.len();
        for _ in 0..5 {
            w.i32(0);
        }

        w.patch_here(ofs_frames, 0);
        write_frames(&mut w, self.num_frames);

        w.patch_here(ofs_frames + 4, 0);
        for name in &self.tag_names {
            w.name(name, 64);
        }

        w.patch_here(ofs_frames + 8, 0);
        for _ in 0..self.num_frames * self.tag_names.len() {
            for _ in 0..6 {
                w.i16(0);
            }
        }

        w.patch_here(ofs_frames + 12, 0);
        for surface in &self.surfaces {
            let start = w.len();
            let num_verts = surface.base_frames.first().map_or(surface.st.len(), Vec::len);

            w.raw(b"IDPC");
            w.name(&surface.name, 64);
            w.i32(0);
            w.i32(count(surface.comp_frames.len()));
            w.i32(count(surface.base_frames.len()));
            w.i32(count(surface.shaders.len()));
            w.i32(count(num_verts));
            w.i32(count(surface.triangles.len()));
            let offsets = w.len();
            for _ in 0..8 {
                w.i32(0);
            }

            w.patch_here(offsets + 4, start);
            write_shaders(&mut w, &surface.shaders);
            w.patch_here(offsets, start);
            write_triangles(&mut w, &surface.triangles);
            w.patch_here(offsets + 8, start);
            write_st(&mut w, &surface.st);
            w.patch_here(offsets + 12, start);
            for vertex in surface.base_frames.iter().flatten() {
                vertex.write(&mut w);
            }
            w.patch_here(offsets + 16, start);
            for delta in surface.comp_frames.iter().flatten() {
                w.u32(delta.packed());
            }
            w.patch_here(offsets + 20, start);
            for &base in &surface.frame_base {
                w.i16(base);
            }
            w.patch_here(offsets + 24, start);
            for &comp in &surface.frame_comp {
                w.i16(comp);
            }
            w.patch_here(offsets + 28, start);
        }

        let end = w.offset();
        w.patch(ofs_frames + 16, end);
        w.into_bytes()
    }
}

/// An MDL skin, one palette index per texel.
#[derive(Debug, Clone)]
pub enum MdlSkin {
    Single(Vec<u8>),
    Group {
        intervals: Vec<f32>,
        images: Vec<Vec<u8>>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MdlSimpleFrame {
    pub name: String,
    /// Packed position and normal index of every vertex.
    pub vertexes: Vec<([u8; 3], u8)>,
}

#[derive(Debug, Clone)]
pub enum MdlFrame {
    Single(MdlSimpleFrame),
    Group {
        intervals: Vec<f32>,
        frames: Vec<MdlSimpleFrame>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MdlTexCoord {
    pub onseam: i32,
    pub s: i32,
    pub t: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MdlTriangle {
    pub faces_front: i32,
    pub vertexes: [i32; 3],
}

#[derive(Debug, Clone)]
pub struct MdlFile {
    pub version: Option<i32>,
    pub scale: [f32; 3],
    pub origin: [f32; 3],
    pub skin_width: i32,
    pub skin_height: i32,
    pub skins: Vec<MdlSkin>,
    pub texcoords: Vec<MdlTexCoord>,
    pub triangles: Vec<MdlTriangle>,
    pub frames: Vec<MdlFrame>,
}

impl Default for MdlFile {
    fn default() -> Self {
        Self {
            version: None,
            scale: [1.0; 3],
            origin: [0.0; 3],
            skin_width: 8,
            skin_height: 8,
            skins: Vec::new(),
            texcoords: Vec::new(),
            triangles: Vec::new(),
            frames: Vec::new(),
        }
    }
}

fn write_simple_frame(w: &mut Writer, frame: &MdlSimpleFrame) {
    w.raw(&[0, 0, 0, 0, 255, 255, 255, 0]);
    w.name(&frame.name, 16);
    for &(xyz, normal) in &frame.vertexes {
        w.raw(&xyz);
        w.u8(normal);
    }
}

impl MdlFile {
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::default();

        w.raw(b"IDPO");
        w.i32(self.version.unwrap_or(6));
        w.vec3(self.scale);
        w.vec3(self.origin);
        w.f32(1.0);
        w.vec3([0.0, 0.0, 24.0]);
        w.i32(count(self.skins.len()));
        w.i32(self.skin_width);
        w.i32(self.skin_height);
        w.i32(count(self.texcoords.len()));
        w.i32(count(self.triangles.len()));
        w.i32(count(self.frames.len()));
        w.i32(0);
        w.i32(0);
        w.f32(1.0);

        for skin in &self.skins {
            match skin {
                MdlSkin::Single(image) => {
                    w.i32(0);
                    w.raw(image);
                }
                MdlSkin::Group { intervals, images } => {
                    w.i32(1);
                    w.i32(count(images.len()));
                    for &interval in intervals {
                        w.f32(interval);
                    }
                    for image in images {
                        w.raw(image);
                    }
                }
            }
        }

        for st in &self.texcoords {
            w.i32(st.onseam);
            w.i32(st.s);
            w.i32(st.t);
        }

        for triangle in &self.triangles {
            w.i32(triangle.faces_front);
            for &v in &triangle.vertexes {
                w.i32(v);
            }
        }

        for frame in &self.frames {
            match frame {
                MdlFrame::Single(frame) => {
                    w.i32(0);
                    write_simple_frame(&mut w, frame);
                }
                MdlFrame::Group { intervals, frames } => {
                    w.i32(1);
                    w.i32(count(frames.len()));
                    w.raw(&[0, 0, 0, 0, 255, 255, 255, 0]);
                    for &interval in intervals {
                        w.f32(interval);
                    }
                    for frame in frames {
                        write_simple_frame(&mut w, frame);
                    }
                }
            }
        }

        w.into_bytes()
    }
}

/// The quad most loader tests use: four corners in the XZ plane facing +Y.
#[must_use]
pub fn quad_md3() -> Md3File {
    let y = Md3Vertex::new;
    Md3File {
        name: String::from("quad"),
        num_frames: 1,
        tags: vec![Md3Tag {
            name: String::from("tag_origin"),
            origin: [0.0, 0.0, 1.0],
        }],
        surfaces: vec![Md3Surface {
            name: String::from("surf0"),
            shaders: vec![String::from("myshader_1")],
            frames: vec![vec![
                y([-64, 0, 64], 64, 64),
                y([64, 0, 64], 64, 64),
                y([64, 0, -64], 64, 64),
                y([-64, 0, -64], 64, 64),
            ]],
            st: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            triangles: vec![[0, 1, 2], [2, 3, 0]],
        }],
        ..Md3File::default()
    }
}

/// A quad in the XY plane facing +Z.
///
/// Frame 0 uses the base frame only, frame 1 moves every corner one unit
/// along X through a compressed frame.
#[must_use]
pub fn quad_mdc() -> MdcFile {
    let z = |xyz| Md3Vertex::new(xyz, 0, 0);
    MdcFile {
        name: String::from("quad"),
        num_frames: 2,
        tag_names: vec![String::from("tag_head")],
        surfaces: vec![MdcSurface {
            name: String::from("surf0"),
            shaders: vec![String::from("myshader_1")],
            base_frames: vec![vec![
                z([-64, -64, 0]),
                z([64, -64, 0]),
                z([-64, 64, 0]),
                z([64, 64, 0]),
            ]],
            comp_frames: vec![vec![MdcDelta::new([20, 0, 0], 0); 4]],
            frame_base: vec![0, 0],
            frame_comp: vec![-1, 0],
            st: vec![[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]],
            triangles: vec![[0, 1, 2], [2, 1, 3]],
        }],
        ..MdcFile::default()
    }
}

/// A quad made of two triangles, with one 8x8 skin.
///
/// Positions span -1 to 1 on X and Z at Y = 0, every normal is table entry 0.
#[must_use]
pub fn quad_mdl() -> MdlFile {
    let corner = |x: u8, z: u8| ([x, 1, z], 0);
    MdlFile {
        origin: [-1.0, -1.0, -1.0],
        skins: vec![MdlSkin::Single((0..64).collect())],
        texcoords: vec![
            MdlTexCoord { onseam: 0, s: 0, t: 0 },
            MdlTexCoord { onseam: 0, s: 7, t: 0 },
            MdlTexCoord { onseam: 0, s: 7, t: 7 },
            MdlTexCoord { onseam: 0, s: 0, t: 7 },
        ],
        triangles: vec![
            MdlTriangle {
                faces_front: 1,
                vertexes: [0, 1, 2],
            },
            MdlTriangle {
                faces_front: 1,
                vertexes: [2, 3, 0],
            },
        ],
        frames: vec![MdlFrame::Single(MdlSimpleFrame {
            name: String::from("frame1"),
            vertexes: vec![corner(0, 2), corner(2, 2), corner(2, 0), corner(0, 0)],
        })],
        ..MdlFile::default()
    }
}
