use std::{fmt, sync::Arc};

use glam::{Vec2, Vec3};
use itertools::Itertools;
use pico_host::Allocator;

use crate::{
    grow::{GrowArray, GROW_ARRAYS, GROW_FACES, GROW_INDEXES, GROW_VERTEXES},
    Error, Result, ShaderId, TriangleVertex, RGBA8,
};

/// Index of a [`Surface`] within its [`Model`](crate::Model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(usize);

impl SurfaceId {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceType {
    #[default]
    Bad,
    Triangles,
    Patch,
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SurfaceType::Bad => "bad",
            SurfaceType::Triangles => "triangles",
            SurfaceType::Patch => "patch",
        })
    }
}

type Channels<T> = GrowArray<Option<GrowArray<T>>>;

/// A mesh sharing one shader and one vertex and index stream.
///
/// Positions, normals, smoothing groups and every live texture coordinate and
/// colour channel always have the same length.
pub struct Surface {
    id: SurfaceId,
    name: String,
    ty: SurfaceType,
    shader: Option<ShaderId>,

    xyz: GrowArray<Vec3>,
    normal: GrowArray<Vec3>,
    smoothing_group: GrowArray<u32>,
    st: Channels<Vec2>,
    color: Channels<RGBA8>,
    index: GrowArray<u32>,
    face_normal: GrowArray<Vec3>,

    allocator: Arc<dyn Allocator>,
}

impl Surface {
    pub(crate) fn new(id: SurfaceId, allocator: Arc<dyn Allocator>) -> Self {
        Self {
            id,
            name: String::new(),
            ty: SurfaceType::Bad,
            shader: None,
            xyz: GrowArray::new(GROW_VERTEXES, Arc::clone(&allocator)),
            normal: GrowArray::new(GROW_VERTEXES, Arc::clone(&allocator)),
            smoothing_group: GrowArray::new(GROW_VERTEXES, Arc::clone(&allocator)),
            st: GrowArray::new(GROW_ARRAYS, Arc::clone(&allocator)),
            color: GrowArray::new(GROW_ARRAYS, Arc::clone(&allocator)),
            index: GrowArray::new(GROW_INDEXES, Arc::clone(&allocator)),
            face_normal: GrowArray::new(GROW_FACES, Arc::clone(&allocator)),
            allocator,
        }
    }

    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn ty(&self) -> SurfaceType {
        self.ty
    }

    pub fn set_type(&mut self, ty: SurfaceType) {
        self.ty = ty;
    }

    /// The shader of this surface. Use [`Model::set_surface_shader`](crate::Model::set_surface_shader) to change it.
    #[must_use]
    pub fn shader(&self) -> Option<ShaderId> {
        self.shader
    }

    pub(crate) fn set_shader(&mut self, shader: Option<ShaderId>) {
        self.shader = shader;
    }

    /// Resizes every array of the surface.
    ///
    /// Storage for all arrays is reserved before any count changes, so on
    /// failure the counts are left as they were. Newly exposed texture
    /// coordinate and colour channels get a per-vertex array of `num_vertexes`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if growing any array fails.
    pub fn adjust(
        &mut self,
        num_vertexes: usize,
        num_st_arrays: usize,
        num_color_arrays: usize,
        num_indexes: usize,
        num_face_normals: usize,
    ) -> Result<()> {
        self.xyz.reserve(num_vertexes)?;
        self.normal.reserve(num_vertexes)?;
        self.smoothing_group.reserve(num_vertexes)?;
        self.st.reserve(num_st_arrays)?;
        self.color.reserve(num_color_arrays)?;
        self.index.reserve(num_indexes)?;
        self.face_normal.reserve(num_face_normals)?;
        reserve_channels(&mut self.st, num_st_arrays, num_vertexes, &self.allocator)?;
        reserve_channels(&mut self.color, num_color_arrays, num_vertexes, &self.allocator)?;

        self.xyz.set_count(num_vertexes)?;
        self.normal.set_count(num_vertexes)?;
        self.smoothing_group.set_count(num_vertexes)?;
        set_channel_counts(&mut self.st, num_st_arrays, num_vertexes)?;
        set_channel_counts(&mut self.color, num_color_arrays, num_vertexes)?;
        self.index.set_count(num_indexes)?;
        self.face_normal.set_count(num_face_normals)?;

        Ok(())
    }

    fn grow(
        &mut self,
        num_vertexes: usize,
        num_st_arrays: usize,
        num_color_arrays: usize,
        num_indexes: usize,
        num_face_normals: usize,
    ) -> Result<()> {
        if num_vertexes <= self.num_vertexes()
            && num_st_arrays <= self.num_st_arrays()
            && num_color_arrays <= self.num_color_arrays()
            && num_indexes <= self.num_indexes()
            && num_face_normals <= self.num_face_normals()
        {
            return Ok(());
        }

        self.adjust(
            num_vertexes.max(self.num_vertexes()),
            num_st_arrays.max(self.num_st_arrays()),
            num_color_arrays.max(self.num_color_arrays()),
            num_indexes.max(self.num_indexes()),
            num_face_normals.max(self.num_face_normals()),
        )
    }

    fn grow_vertexes(&mut self, num_vertexes: usize) -> Result<()> {
        self.grow(num_vertexes, 0, 0, 0, 0)
    }

    #[must_use]
    pub fn num_vertexes(&self) -> usize {
        self.xyz.len()
    }

    #[must_use]
    pub fn max_vertexes(&self) -> usize {
        self.xyz.capacity()
    }

    #[must_use]
    pub fn num_st_arrays(&self) -> usize {
        self.st.len()
    }

    #[must_use]
    pub fn max_st_arrays(&self) -> usize {
        self.st.capacity()
    }

    #[must_use]
    pub fn num_color_arrays(&self) -> usize {
        self.color.len()
    }

    #[must_use]
    pub fn max_color_arrays(&self) -> usize {
        self.color.capacity()
    }

    #[must_use]
    pub fn num_indexes(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn max_indexes(&self) -> usize {
        self.index.capacity()
    }

    #[must_use]
    pub fn num_face_normals(&self) -> usize {
        self.face_normal.len()
    }

    #[must_use]
    pub fn max_face_normals(&self) -> usize {
        self.face_normal.capacity()
    }

    #[must_use]
    pub fn xyzs(&self) -> &[Vec3] {
        self.xyz.as_slice()
    }

    #[must_use]
    pub fn normals(&self) -> &[Vec3] {
        self.normal.as_slice()
    }

    #[must_use]
    pub fn smoothing_groups(&self) -> &[u32] {
        self.smoothing_group.as_slice()
    }

    #[must_use]
    pub fn indexes(&self) -> &[u32] {
        self.index.as_slice()
    }

    #[must_use]
    pub fn face_normals(&self) -> &[Vec3] {
        self.face_normal.as_slice()
    }

    #[must_use]
    pub fn st_array(&self, channel: usize) -> Option<&[Vec2]> {
        self.st.get(channel)?.as_ref().map(GrowArray::as_slice)
    }

    #[must_use]
    pub fn color_array(&self, channel: usize) -> Option<&[RGBA8]> {
        self.color.get(channel)?.as_ref().map(GrowArray::as_slice)
    }

    #[must_use]
    pub fn xyz(&self, num: usize) -> Option<Vec3> {
        self.xyz.get(num).copied()
    }

    #[must_use]
    pub fn normal(&self, num: usize) -> Option<Vec3> {
        self.normal.get(num).copied()
    }

    #[must_use]
    pub fn smoothing_group(&self, num: usize) -> Option<u32> {
        self.smoothing_group.get(num).copied()
    }

    #[must_use]
    pub fn st(&self, channel: usize, num: usize) -> Option<Vec2> {
        self.st_array(channel)?.get(num).copied()
    }

    #[must_use]
    pub fn color(&self, channel: usize, num: usize) -> Option<RGBA8> {
        self.color_array(channel)?.get(num).copied()
    }

    #[must_use]
    pub fn index(&self, num: usize) -> Option<u32> {
        self.index.get(num).copied()
    }

    #[must_use]
    pub fn face_normal(&self, num: usize) -> Option<Vec3> {
        self.face_normal.get(num).copied()
    }

    /// # Errors
    ///
    /// Returns `Err` if the surface has to grow and growing fails.
    pub fn set_xyz(&mut self, num: usize, xyz: Vec3) -> Result<()> {
        self.grow_vertexes(slots(num)?)?;
        self.xyz.as_mut_slice()[num] = xyz;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Err` if the surface has to grow and growing fails.
    pub fn set_normal(&mut self, num: usize, normal: Vec3) -> Result<()> {
        self.grow_vertexes(slots(num)?)?;
        self.normal.as_mut_slice()[num] = normal;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Err` if the surface has to grow and growing fails.
    pub fn set_smoothing_group(&mut self, num: usize, group: u32) -> Result<()> {
        self.grow_vertexes(slots(num)?)?;
        self.smoothing_group.as_mut_slice()[num] = group;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Err` if the surface has to grow and growing fails.
    pub fn set_st(&mut self, channel: usize, num: usize, st: Vec2) -> Result<()> {
        self.grow(slots(num)?, slots(channel)?, 0, 0, 0)?;
        *channel_slot(&mut self.st, channel, num)? = st;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Err` if the surface has to grow and growing fails.
    pub fn set_color(&mut self, channel: usize, num: usize, color: RGBA8) -> Result<()> {
        self.grow(slots(num)?, 0, slots(channel)?, 0, 0)?;
        *channel_slot(&mut self.color, channel, num)? = color;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Err` if the surface has to grow and growing fails.
    pub fn set_index(&mut self, num: usize, index: u32) -> Result<()> {
        self.grow(0, 0, 0, slots(num)?, 0)?;
        self.index.as_mut_slice()[num] = index;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Err` if the surface has to grow and growing fails.
    pub fn set_face_normal(&mut self, num: usize, normal: Vec3) -> Result<()> {
        self.grow(0, 0, 0, 0, slots(num)?)?;
        self.face_normal.as_mut_slice()[num] = normal;
        Ok(())
    }

    /// Finds a vertex identical to `vertex` in every attribute.
    ///
    /// Only the first texture coordinate and colour channels are compared.
    #[must_use]
    pub fn find_vertex(&self, vertex: &TriangleVertex) -> Option<usize> {
        (0..self.num_vertexes()).find(|&i| {
            self.xyz(i) == Some(vertex.xyz)
                && self.normal(i) == Some(vertex.normal)
                && self.smoothing_group(i) == Some(vertex.smoothing_group)
                && self.st(0, i).map_or(true, |st| st == vertex.st)
                && self.color(0, i).map_or(true, |color| color == vertex.color)
        })
    }

    pub(crate) fn push_vertex(&mut self, vertex: &TriangleVertex) -> Result<usize> {
        let num = self.num_vertexes();
        self.grow(slots(num)?, 1, 1, 0, 0)?;

        self.xyz.as_mut_slice()[num] = vertex.xyz;
        self.normal.as_mut_slice()[num] = vertex.normal;
        self.smoothing_group.as_mut_slice()[num] = vertex.smoothing_group;
        *channel_slot(&mut self.st, 0, num)? = vertex.st;
        *channel_slot(&mut self.color, 0, num)? = vertex.color;

        Ok(num)
    }

    fn triangle_normal(&self, (a, b, c): (u32, u32, u32)) -> Vec3 {
        let corner = |index: u32| self.xyz(index as usize);

        match (corner(a), corner(b), corner(c)) {
            (Some(a), Some(b), Some(c)) => (b - a).cross(c - a).normalize_or_zero(),
            _ => Vec3::ZERO,
        }
    }

    /// Stores one unit normal per triangle.
    /// Degenerate triangles get a zero normal.
    ///
    /// # Errors
    ///
    /// Returns `Err` if growing the face normal array fails.
    pub fn calculate_face_normals(&mut self) -> Result<()> {
        let normals: Vec<Vec3> = self
            .indexes()
            .iter()
            .copied()
            .tuples()
            .map(|triangle| self.triangle_normal(triangle))
            .collect();

        self.face_normal.resize(normals.len())?;
        self.face_normal.as_mut_slice().copy_from_slice(&normals);

        Ok(())
    }

    /// Replaces zero length vertex normals with the average of the adjacent face normals.
    ///
    /// # Errors
    ///
    /// Returns `Err` if face normals have to be calculated and that fails.
    pub fn fix_normals(&mut self) -> Result<()> {
        if self.num_face_normals() != self.num_indexes() / 3 {
            self.calculate_face_normals()?;
        }

        let mut sums = vec![Vec3::ZERO; self.num_vertexes()];
        for (triangle, face_normal) in self
            .index
            .iter()
            .tuples::<(_, _, _)>()
            .zip(self.face_normal.iter())
        {
            for &index in [triangle.0, triangle.1, triangle.2] {
                if let Some(sum) = sums.get_mut(index as usize) {
                    *sum += *face_normal;
                }
            }
        }

        for (normal, sum) in self.normal.iter_mut().zip(sums) {
            if normal.length_squared() < f32::EPSILON {
                *normal = sum.normalize_or_zero();
            }
        }

        Ok(())
    }

    /// Axis aligned bounds of the vertices, if there are any.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let (first, rest) = self.xyzs().split_first()?;

        Some(
            rest.iter()
                .fold((*first, *first), |(min, max), &xyz| (min.min(xyz), max.max(xyz))),
        )
    }

    /// Checks the invariants that only hold once the surface is complete.
    ///
    /// # Errors
    ///
    /// Returns `Err` describing the first violated invariant.
    pub fn verify(&self) -> Result<()> {
        let num_vertexes = self.num_vertexes();

        if self.normal.len() != num_vertexes || self.smoothing_group.len() != num_vertexes {
            return Err(Error::InvalidModel("vertex arrays differ in length"));
        }

        for channel in &self.st {
            if channel.as_ref().map(GrowArray::len) != Some(num_vertexes) {
                return Err(Error::InvalidModel("st channel length differs from vertex count"));
            }
        }

        for channel in &self.color {
            if channel.as_ref().map(GrowArray::len) != Some(num_vertexes) {
                return Err(Error::InvalidModel(
                    "color channel length differs from vertex count",
                ));
            }
        }

        if self.ty == SurfaceType::Triangles && self.num_indexes() % 3 != 0 {
            return Err(Error::InvalidModel(
                "triangle surface index count isn't a multiple of 3",
            ));
        }

        if self.indexes().iter().any(|&i| i as usize >= num_vertexes) {
            return Err(Error::InvalidModel("index out of vertex range"));
        }

        Ok(())
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("shader", &self.shader)
            .field("num_vertexes", &self.num_vertexes())
            .field("num_st_arrays", &self.num_st_arrays())
            .field("num_color_arrays", &self.num_color_arrays())
            .field("num_indexes", &self.num_indexes())
            .field("num_face_normals", &self.num_face_normals())
            .finish()
    }
}

fn reserve_channels<T: Default>(
    channels: &mut Channels<T>,
    count: usize,
    num_vertexes: usize,
    allocator: &Arc<dyn Allocator>,
) -> Result<()> {
    for slot in &mut channels.slots_mut()[..count] {
        slot.get_or_insert_with(|| GrowArray::new(GROW_VERTEXES, Arc::clone(allocator)))
            .reserve(num_vertexes)?;
    }
    Ok(())
}

fn set_channel_counts<T: Default>(
    channels: &mut Channels<T>,
    count: usize,
    num_vertexes: usize,
) -> Result<()> {
    channels.set_count(count)?;
    for channel in channels.iter_mut().flatten() {
        channel.set_count(num_vertexes)?;
    }
    Ok(())
}

/// Count of slots needed to hold `num`.
fn slots(num: usize) -> Result<usize> {
    num.checked_add(1).ok_or(Error::OutOfMemory)
}

fn channel_slot<T>(channels: &mut Channels<T>, channel: usize, num: usize) -> Result<&mut T> {
    channels
        .get_mut(channel)
        .and_then(Option::as_mut)
        .and_then(|array| array.get_mut(num))
        .ok_or(Error::InvalidModel("channel slot isn't live"))
}
