//! Records and surface building shared by MD3 and MDC.

use byteorder::LE;
use itertools::izip;
use tracing::debug;
use zerocopy::{
    byteorder::{I16, I32, U32},
    FromBytes, Unaligned,
};

use pico_model::{
    binary_utils::fixed_str,
    host::{Host, PrintLevel},
    normals::decode_lat_lng,
    path, Error, FileType, Model, Result, SurfaceType, Vec2, Vec3, WHITE,
};

/// Scale of the fixed point vertex positions.
pub const XYZ_SCALE: f32 = 1.0 / 64.0;

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
pub struct ShaderRecord {
    name: [u8; 64],
    index: I32<LE>,
}

impl ShaderRecord {
    #[must_use]
    pub fn name(&self) -> String {
        fixed_str(&self.name)
    }

    #[must_use]
    pub fn index(&self) -> i32 {
        self.index.get()
    }
}

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
pub struct Triangle {
    indexes: [I32<LE>; 3],
}

impl Triangle {
    #[must_use]
    pub fn indexes(&self) -> [i32; 3] {
        self.indexes.map(I32::get)
    }
}

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
pub struct TexCoord {
    st: [U32<LE>; 2],
}

impl TexCoord {
    #[must_use]
    pub fn st(&self) -> Vec2 {
        Vec2::new(f32::from_bits(self.st[0].get()), f32::from_bits(self.st[1].get()))
    }
}

/// A fixed point position with a normal packed into two byte angles.
#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
pub struct Vertex {
    xyz: [I16<LE>; 3],
    lat: u8,
    lng: u8,
}

impl Vertex {
    #[must_use]
    pub fn xyz(&self) -> [i16; 3] {
        self.xyz.map(I16::get)
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        let [x, y, z] = self.xyz();
        Vec3::new(f32::from(x), f32::from(y), f32::from(z)) * XYZ_SCALE
    }

    #[must_use]
    pub fn normal(&self) -> Vec3 {
        decode_lat_lng(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, FromBytes, Unaligned)]
#[repr(C)]
pub struct Frame {
    bounds: [[U32<LE>; 3]; 2],
    local_origin: [U32<LE>; 3],
    radius: U32<LE>,
    name: [u8; 16],
}

fn vec3(v: &[U32<LE>; 3]) -> Vec3 {
    Vec3::new(
        f32::from_bits(v[0].get()),
        f32::from_bits(v[1].get()),
        f32::from_bits(v[2].get()),
    )
}

impl Frame {
    #[must_use]
    pub fn name(&self) -> String {
        fixed_str(&self.name)
    }

    #[must_use]
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (vec3(&self.bounds[0]), vec3(&self.bounds[1]))
    }

    #[must_use]
    pub fn local_origin(&self) -> Vec3 {
        vec3(&self.local_origin)
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        f32::from_bits(self.radius.get())
    }
}

/// Creates the model every loader of this crate fills.
pub(crate) fn new_model(
    host: &Host,
    file_name: &str,
    frame: usize,
    num_frames: usize,
) -> Result<Model> {
    let mut model = Model::with_allocator(host.allocator())?;
    model.set_name(path::file_stem(file_name));
    model.set_file_name(file_name);
    model.set_frame_num(frame);
    model.set_num_frames(num_frames);
    Ok(model)
}

/// One decoded surface frame, ready to be added to a model.
pub(crate) struct SurfaceData<'a> {
    pub name: String,
    pub shader_name: Option<String>,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: &'a [TexCoord],
    pub triangles: &'a [Triangle],
}

/// Adds a triangle surface with its own shader.
pub(crate) fn add_surface(
    model: &mut Model,
    host: &Host,
    ty: FileType,
    data: SurfaceData,
) -> Result<()> {
    let num_vertexes = data.positions.len();
    if data.normals.len() != num_vertexes || data.texcoords.len() != num_vertexes {
        return Err(Error::Corrupted {
            ty,
            error: "surface vertex arrays differ in length",
        });
    }

    debug!(
        "surface `{}`: {} vertexes, {} triangles",
        data.name,
        num_vertexes,
        data.triangles.len()
    );

    let shader_name = data.shader_name.unwrap_or_else(|| {
        host.print(
            PrintLevel::Warning,
            &format!(
                "{} surface `{}` has no shaders, using the surface name",
                ty, data.name
            ),
        );
        data.name.clone()
    });

    let shader = model.new_shader()?;
    model
        .shader_mut(shader.index())
        .ok_or(Error::InvalidModel("new shader is missing"))?
        .set_name(shader_name);

    let id = model.new_surface()?;
    model.set_surface_shader(id, Some(shader))?;

    let surface = model
        .surface_mut(id.index())
        .ok_or(Error::InvalidModel("new surface is missing"))?;
    surface.set_type(SurfaceType::Triangles);
    surface.set_name(data.name);
    surface.adjust(num_vertexes, 1, 1, data.triangles.len() * 3, 0)?;

    for (i, position, normal, texcoord) in izip!(
        0..,
        data.positions,
        data.normals,
        data.texcoords
    ) {
        surface.set_xyz(i, position)?;
        surface.set_normal(i, normal)?;
        surface.set_st(0, i, texcoord.st())?;
        surface.set_color(0, i, WHITE)?;
    }

    for (i, index) in data
        .triangles
        .iter()
        .flat_map(Triangle::indexes)
        .enumerate()
    {
        let index = u32::try_from(index)
            .ok()
            .filter(|&index| (index as usize) < num_vertexes)
            .ok_or(Error::Corrupted {
                ty,
                error: "triangle index out of range",
            })?;
        surface.set_index(i, index)?;
    }

    Ok(())
}
