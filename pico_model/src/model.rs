use std::{fmt, mem::size_of, sync::Arc};

use glam::{Vec2, Vec3};
use pico_host::{Allocator, SystemAllocator};
use tracing::debug;

use crate::{
    grow::{GrowArray, GROW_SHADERS, GROW_SURFACES},
    Error, ModuleInfo, Result, Shader, ShaderId, Surface, SurfaceId, SurfaceType, RGBA8, WHITE,
};

/// One corner of a triangle passed to [`Model::add_triangle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleVertex {
    pub xyz: Vec3,
    pub normal: Vec3,
    pub smoothing_group: u32,
    pub st: Vec2,
    pub color: RGBA8,
}

impl Default for TriangleVertex {
    fn default() -> Self {
        Self {
            xyz: Vec3::ZERO,
            normal: Vec3::ZERO,
            smoothing_group: 0,
            st: Vec2::ZERO,
            color: WHITE,
        }
    }
}

/// A decoded model frame: shaders, and surfaces referring to them.
pub struct Model {
    name: String,
    file_name: String,
    frame_num: usize,
    num_frames: usize,
    module: Option<ModuleInfo>,

    shaders: GrowArray<Option<Shader>>,
    surfaces: GrowArray<Option<Surface>>,

    allocator: Arc<dyn Allocator>,
}

impl Model {
    /// Creates an empty model whose storage isn't accounted anywhere.
    #[must_use]
    pub fn new() -> Self {
        Self::from_granted(Arc::new(SystemAllocator))
    }

    /// Creates an empty model accounting its storage through `allocator`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the allocator refuses the model itself.
    pub fn with_allocator(allocator: Arc<dyn Allocator>) -> Result<Self> {
        if !allocator.alloc(size_of::<Self>()) {
            return Err(Error::OutOfMemory);
        }

        Ok(Self::from_granted(allocator))
    }

    fn from_granted(allocator: Arc<dyn Allocator>) -> Self {
        Self {
            name: String::new(),
            file_name: String::new(),
            frame_num: 0,
            num_frames: 0,
            module: None,
            shaders: GrowArray::new(GROW_SHADERS, Arc::clone(&allocator)),
            surfaces: GrowArray::new(GROW_SURFACES, Arc::clone(&allocator)),
            allocator,
        }
    }

    /// Tears down the model with every shader and surface it owns.
    pub fn free(self) {
        drop(self);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.file_name = file_name.into();
    }

    /// The frame the model was loaded at.
    #[must_use]
    pub fn frame_num(&self) -> usize {
        self.frame_num
    }

    pub fn set_frame_num(&mut self, frame_num: usize) {
        self.frame_num = frame_num;
    }

    /// Number of frames in the source file.
    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn set_num_frames(&mut self, num_frames: usize) {
        self.num_frames = num_frames;
    }

    /// The format module the model was loaded with.
    #[must_use]
    pub fn module(&self) -> Option<ModuleInfo> {
        self.module
    }

    pub fn set_module(&mut self, module: ModuleInfo) {
        self.module = Some(module);
    }

    /// Sets both the shader and surface counts.
    /// Storage is reserved for both before either count changes.
    ///
    /// # Errors
    ///
    /// Returns `Err` if growing storage fails, leaving the counts unchanged.
    pub fn adjust(&mut self, num_shaders: usize, num_surfaces: usize) -> Result<()> {
        self.shaders.reserve(num_shaders)?;
        self.surfaces.reserve(num_surfaces)?;

        self.shaders.set_count(num_shaders)?;
        self.surfaces.set_count(num_surfaces)
    }

    /// Appends a default shader.
    ///
    /// # Errors
    ///
    /// Returns `Err` if growing the shader list fails.
    pub fn new_shader(&mut self) -> Result<ShaderId> {
        let id = ShaderId::new(self.num_shaders());
        self.adjust(id.index() + 1, self.num_surfaces())?;
        self.shaders.as_mut_slice()[id.index()] = Some(Shader::new(id));
        Ok(id)
    }

    /// Appends an empty surface of type [`SurfaceType::Bad`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if growing the surface list fails.
    pub fn new_surface(&mut self) -> Result<SurfaceId> {
        let id = SurfaceId::new(self.num_surfaces());
        self.adjust(self.num_shaders(), id.index() + 1)?;
        self.surfaces.as_mut_slice()[id.index()] =
            Some(Surface::new(id, Arc::clone(&self.allocator)));
        Ok(id)
    }

    #[must_use]
    pub fn num_shaders(&self) -> usize {
        self.shaders.len()
    }

    #[must_use]
    pub fn max_shaders(&self) -> usize {
        self.shaders.capacity()
    }

    #[must_use]
    pub fn num_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    #[must_use]
    pub fn max_surfaces(&self) -> usize {
        self.surfaces.capacity()
    }

    #[must_use]
    pub fn shader(&self, index: usize) -> Option<&Shader> {
        self.shaders.get(index)?.as_ref()
    }

    pub fn shader_mut(&mut self, index: usize) -> Option<&mut Shader> {
        self.shaders.get_mut(index)?.as_mut()
    }

    #[must_use]
    pub fn surface(&self, index: usize) -> Option<&Surface> {
        self.surfaces.get(index)?.as_ref()
    }

    pub fn surface_mut(&mut self, index: usize) -> Option<&mut Surface> {
        self.surfaces.get_mut(index)?.as_mut()
    }

    /// Live shaders, skipping slots that were exposed but never filled.
    pub fn shaders(&self) -> impl Iterator<Item = &Shader> {
        self.shaders.iter().flatten()
    }

    /// Live surfaces, skipping slots that were exposed but never filled.
    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.iter().flatten()
    }

    pub fn surfaces_mut(&mut self) -> impl Iterator<Item = &mut Surface> {
        self.surfaces.iter_mut().flatten()
    }

    /// The shader the surface at `index` refers to.
    #[must_use]
    pub fn surface_shader(&self, index: usize) -> Option<&Shader> {
        self.shader(self.surface(index)?.shader()?.index())
    }

    /// Points a surface at a shader of this model, or at none.
    ///
    /// # Errors
    ///
    /// Returns `Err` if either the surface or the shader isn't part of this model.
    pub fn set_surface_shader(
        &mut self,
        surface: SurfaceId,
        shader: Option<ShaderId>,
    ) -> Result<()> {
        if let Some(shader) = shader {
            if self.shader(shader.index()).is_none() {
                return Err(Error::InvalidModel("shader isn't part of the model"));
            }
        }

        self.surface_mut(surface.index())
            .ok_or(Error::InvalidModel("surface isn't part of the model"))?
            .set_shader(shader);

        Ok(())
    }

    #[must_use]
    pub fn find_shader(&self, name: &str, case_sensitive: bool) -> Option<ShaderId> {
        self.shaders()
            .find(|shader| names_match(shader.name(), name, case_sensitive))
            .map(Shader::id)
    }

    #[must_use]
    pub fn find_surface(&self, name: &str, case_sensitive: bool) -> Option<SurfaceId> {
        self.surfaces()
            .find(|surface| names_match(surface.name(), name, case_sensitive))
            .map(Surface::id)
    }

    #[must_use]
    pub fn total_vertexes(&self) -> usize {
        self.surfaces().map(Surface::num_vertexes).sum()
    }

    #[must_use]
    pub fn total_indexes(&self) -> usize {
        self.surfaces().map(Surface::num_indexes).sum()
    }

    /// Axis aligned bounds over the vertices of every surface.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.surfaces()
            .filter_map(Surface::bounds)
            .reduce(|(min_a, max_a), (min_b, max_b)| (min_a.min(min_b), max_a.max(max_b)))
    }

    /// Adds a triangle to the triangle surface using `shader`, creating the surface if needed.
    ///
    /// Corners identical to an existing vertex of the surface reuse it.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `shader` isn't part of the model or growing storage fails.
    pub fn add_triangle(
        &mut self,
        shader: Option<ShaderId>,
        vertices: &[TriangleVertex; 3],
    ) -> Result<SurfaceId> {
        let existing = self
            .surfaces()
            .find(|surface| surface.ty() == SurfaceType::Triangles && surface.shader() == shader)
            .map(Surface::id);

        let id = if let Some(id) = existing {
            id
        } else {
            let name = match shader {
                Some(shader) => self
                    .shader(shader.index())
                    .ok_or(Error::InvalidModel("shader isn't part of the model"))?
                    .name()
                    .to_owned(),
                None => String::from("unnamed"),
            };

            debug!("creating triangle surface `{}`", name);

            let id = self.new_surface()?;
            self.set_surface_shader(id, shader)?;

            let surface = self
                .surface_mut(id.index())
                .ok_or(Error::InvalidModel("surface isn't part of the model"))?;
            surface.set_type(SurfaceType::Triangles);
            surface.set_name(name);
            id
        };

        let surface = self
            .surface_mut(id.index())
            .ok_or(Error::InvalidModel("surface isn't part of the model"))?;

        for vertex in vertices {
            let num = match surface.find_vertex(vertex) {
                Some(num) => num,
                None => surface.push_vertex(vertex)?,
            };
            let num = u32::try_from(num).map_err(|_| Error::InvalidModel("too many vertexes"))?;

            surface.set_index(surface.num_indexes(), num)?;
        }

        Ok(id)
    }

    /// Checks the invariants of a complete model.
    ///
    /// # Errors
    ///
    /// Returns `Err` describing the first violated invariant.
    pub fn verify(&self) -> Result<()> {
        if self.shaders.iter().any(Option::is_none) {
            return Err(Error::InvalidModel("shader slot is empty"));
        }

        for surface in &self.surfaces {
            let surface = surface
                .as_ref()
                .ok_or(Error::InvalidModel("surface slot is empty"))?;

            surface.verify()?;

            if let Some(shader) = surface.shader() {
                if self.shader(shader.index()).is_none() {
                    return Err(Error::InvalidModel(
                        "surface refers to a shader outside the model",
                    ));
                }
            }
        }

        Ok(())
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        self.allocator.free(size_of::<Self>());
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("file_name", &self.file_name)
            .field("frame_num", &self.frame_num)
            .field("num_frames", &self.num_frames)
            .field("module", &self.module.map(|module| module.id))
            .field("shaders", &self.shaders)
            .field("surfaces", &self.surfaces)
            .finish()
    }
}

fn names_match(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn corner(x: f32, y: f32) -> TriangleVertex {
        TriangleVertex {
            xyz: Vec3::new(x, y, 0.0),
            normal: Vec3::Z,
            st: Vec2::new(x, y),
            ..TriangleVertex::default()
        }
    }

    #[test]
    fn new_shader_exposes_one_slot() {
        let mut model = Model::new();
        for i in 0..17 {
            let id = model.new_shader().unwrap();
            assert_eq!(id.index(), i);
            assert_eq!(model.num_shaders(), i + 1);
            assert_eq!(model.shader(i).unwrap().id(), id);
        }
        assert_eq!(model.max_shaders(), 32);
        assert_eq!(model.num_surfaces(), 0);
    }

    #[test]
    fn adjust_to_zero_keeps_capacity() {
        let mut model = Model::new();
        model.adjust(9, 9).unwrap();
        assert_eq!((model.max_shaders(), model.max_surfaces()), (16, 16));

        model.adjust(0, 0).unwrap();
        assert_eq!((model.num_shaders(), model.num_surfaces()), (0, 0));
        assert_eq!((model.max_shaders(), model.max_surfaces()), (16, 16));
    }

    #[test]
    fn exposed_slots_are_absent() {
        let mut model = Model::new();
        model.adjust(2, 3).unwrap();
        assert!(model.shader(1).is_none());
        assert!(model.surface(2).is_none());
        assert_eq!(model.surfaces().count(), 0);
        assert!(model.verify().is_err());
    }

    #[test]
    fn surface_shader_must_belong_to_model() {
        let mut model = Model::new();
        let surface = model.new_surface().unwrap();

        assert!(model
            .set_surface_shader(surface, Some(ShaderId::new(0)))
            .is_err());

        let shader = model.new_shader().unwrap();
        model.set_surface_shader(surface, Some(shader)).unwrap();
        assert_eq!(model.surface_shader(0).unwrap().id(), shader);
    }

    #[test]
    fn find_by_name() {
        let mut model = Model::new();
        let shader = model.new_shader().unwrap();
        model.shader_mut(0).unwrap().set_name("textures/Box");
        let surface = model.new_surface().unwrap();
        model.surface_mut(0).unwrap().set_name("Box");

        assert_eq!(model.find_shader("textures/Box", true), Some(shader));
        assert_eq!(model.find_shader("textures/box", true), None);
        assert_eq!(model.find_shader("TEXTURES/BOX", false), Some(shader));
        assert_eq!(model.find_surface("box", false), Some(surface));
        assert_eq!(model.find_surface("box", true), None);
    }

    #[test]
    fn add_triangle_reuses_vertices() {
        let mut model = Model::new();
        let shader = model.new_shader().unwrap();
        model.shader_mut(0).unwrap().set_name("quad");

        let a = corner(0.0, 0.0);
        let b = corner(1.0, 0.0);
        let c = corner(1.0, 1.0);
        let d = corner(0.0, 1.0);

        let first = model.add_triangle(Some(shader), &[a, b, c]).unwrap();
        let second = model.add_triangle(Some(shader), &[a, c, d]).unwrap();
        assert_eq!(first, second);

        let surface = model.surface(first.index()).unwrap();
        assert_eq!(surface.name(), "quad");
        assert_eq!(surface.ty(), SurfaceType::Triangles);
        assert_eq!(surface.num_vertexes(), 4);
        assert_eq!(surface.indexes(), &[0, 1, 2, 0, 2, 3]);
        assert_eq!(surface.st(0, 3), Some(Vec2::new(0.0, 1.0)));
        assert_eq!(surface.color(0, 3), Some(WHITE));
        assert_eq!(model.total_vertexes(), 4);
        assert_eq!(model.total_indexes(), 6);
        model.verify().unwrap();
    }

    #[test]
    fn add_triangle_separates_shaders() {
        let mut model = Model::new();
        let red = model.new_shader().unwrap();
        let blue = model.new_shader().unwrap();
        let tri = [corner(0.0, 0.0), corner(1.0, 0.0), corner(0.0, 1.0)];

        let a = model.add_triangle(Some(red), &tri).unwrap();
        let b = model.add_triangle(Some(blue), &tri).unwrap();
        let c = model.add_triangle(None, &tri).unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(model.num_surfaces(), 3);
        assert_eq!(model.surface(c.index()).unwrap().name(), "unnamed");

        assert!(model
            .add_triangle(Some(ShaderId::new(5)), &tri)
            .is_err());
    }

    #[test]
    fn bounds_span_all_surfaces() {
        let mut model = Model::new();
        assert!(model.bounds().is_none());

        let first = model.new_surface().unwrap();
        let second = model.new_surface().unwrap();
        let first = model.surface_mut(first.index()).unwrap();
        first.set_xyz(0, Vec3::new(-1.0, 2.0, 0.0)).unwrap();
        first.set_xyz(1, Vec3::new(3.0, 0.0, 0.0)).unwrap();
        let second = model.surface_mut(second.index()).unwrap();
        second.set_xyz(0, Vec3::new(0.0, -5.0, 7.0)).unwrap();

        let (min, max) = model.bounds().unwrap();
        assert_relative_eq!(min, Vec3::new(-1.0, -5.0, 0.0));
        assert_relative_eq!(max, Vec3::new(3.0, 2.0, 7.0));
    }
}
