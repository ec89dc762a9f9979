use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use pico_model::{
    host::Allocator, Error, Model, SurfaceType, Vec2, Vec3, GROW_ARRAYS, GROW_FACES,
    GROW_INDEXES, GROW_SHADERS, GROW_SURFACES, GROW_VERTEXES, RGBA8,
};

#[derive(Debug, Default)]
struct Counting {
    allocs: AtomicUsize,
    frees: AtomicUsize,
    live_bytes: AtomicUsize,
    refuse_after: Option<usize>,
}

impl Counting {
    fn refusing_after(allocs: usize) -> Self {
        Self {
            refuse_after: Some(allocs),
            ..Self::default()
        }
    }

    fn allocs(&self) -> usize {
        self.allocs.load(Ordering::SeqCst)
    }

    fn frees(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }

    fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::SeqCst)
    }
}

impl Allocator for Counting {
    fn alloc(&self, size: usize) -> bool {
        if self.refuse_after.map_or(false, |n| self.allocs() >= n) {
            return false;
        }
        self.allocs.fetch_add(1, Ordering::SeqCst);
        self.live_bytes.fetch_add(size, Ordering::SeqCst);
        true
    }

    fn free(&self, size: usize) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        self.live_bytes.fetch_sub(size, Ordering::SeqCst);
    }
}

#[test]
fn empty_model_allocates_once() {
    let counting = Arc::new(Counting::default());
    let model = Model::with_allocator(counting.clone()).unwrap();
    assert_eq!(counting.allocs(), 1);

    model.free();
    assert_eq!(counting.allocs(), 1);
    assert_eq!(counting.frees(), 1);
    assert_eq!(counting.live_bytes(), 0);
}

#[test]
fn grow_to_9_and_18() {
    let mut model = Model::new();

    model.adjust(9, 9).unwrap();
    assert_eq!((model.num_shaders(), model.num_surfaces()), (9, 9));
    assert_eq!(model.max_shaders(), GROW_SHADERS);
    assert_eq!(model.max_surfaces(), GROW_SURFACES);

    model.adjust(18, 18).unwrap();
    assert_eq!(model.max_shaders(), GROW_SHADERS * 2);
    assert_eq!(model.max_surfaces(), GROW_SURFACES * 2);

    model.adjust(5, 5).unwrap();
    assert_eq!(model.max_shaders(), GROW_SHADERS * 2);
}

#[test]
fn drop_after_resetting_counts() {
    let counting = Arc::new(Counting::default());
    let mut model = Model::with_allocator(counting.clone()).unwrap();
    model.adjust(9, 9).unwrap();
    model.adjust(0, 0).unwrap();

    let surface = model.new_surface().unwrap();
    let surface = model.surface_mut(surface.index()).unwrap();
    surface.adjust(1, 1, 1, 1, 1).unwrap();
    assert_eq!(surface.max_vertexes(), GROW_VERTEXES);
    assert_eq!(surface.max_indexes(), GROW_INDEXES);
    assert_eq!(surface.max_face_normals(), GROW_FACES);
    assert_eq!(surface.max_st_arrays(), GROW_ARRAYS);
    assert_eq!(surface.max_color_arrays(), GROW_ARRAYS);
    surface.adjust(0, 0, 0, 0, 0).unwrap();

    drop(model);
    assert_eq!(counting.allocs(), counting.frees());
    assert_eq!(counting.live_bytes(), 0);
}

#[test]
fn refused_growth_keeps_counts() {
    // the model itself and the first shader block
    let counting = Arc::new(Counting::refusing_after(2));
    let mut model = Model::with_allocator(counting.clone()).unwrap();

    for _ in 0..GROW_SHADERS {
        model.new_shader().unwrap();
    }
    assert_eq!(model.new_shader(), Err(Error::OutOfMemory));
    assert_eq!(model.num_shaders(), GROW_SHADERS);
    assert_eq!(model.new_surface(), Err(Error::OutOfMemory));
    assert_eq!(model.num_surfaces(), 0);

    model.free();
    assert_eq!(counting.allocs(), counting.frees());
    assert_eq!(counting.live_bytes(), 0);
}

#[test]
fn refused_model_allocation() {
    let counting = Arc::new(Counting::refusing_after(0));
    assert!(matches!(
        Model::with_allocator(counting.clone()),
        Err(Error::OutOfMemory)
    ));
    assert_eq!(counting.frees(), 0);
}

#[test]
fn complete_model() {
    let mut model = Model::new();
    model.set_name("triangle");
    model.set_file_name("triangle.model");
    model.set_frame_num(0);
    model.set_num_frames(1);
    assert_eq!(model.name(), "triangle");
    assert_eq!(model.file_name(), "triangle.model");
    assert_eq!((model.frame_num(), model.num_frames()), (0, 1));

    let surface = model.new_surface().unwrap();
    let shader = model.new_shader().unwrap();
    model
        .shader_mut(shader.index())
        .unwrap()
        .set_name("triangle_shader_1");
    model.set_surface_shader(surface, Some(shader)).unwrap();

    let white = RGBA8::new(255, 255, 255, 255);
    {
        let surface = model.surface_mut(surface.index()).unwrap();
        surface.set_type(SurfaceType::Triangles);
        surface.set_name("triangle_surface_1");

        for i in 0..9 {
            surface.set_index(i, i as u32).unwrap();
        }

        for v in 0..9 {
            let f = v as f32;
            let st = (v & 2) as f32;
            surface
                .set_xyz(v, Vec3::new(10.0 + f * 10.0, 20.0 + f * 10.0, 30.0 + f * 10.0))
                .unwrap();
            surface.set_normal(v, Vec3::new(1.0, 1.0, 0.0)).unwrap();
            surface.set_st(0, v, Vec2::new(st, st)).unwrap();
            surface.set_color(0, v, white).unwrap();
        }
    }

    model.verify().unwrap();

    let surface = model.surface(surface.index()).unwrap();
    assert_eq!(surface.ty(), SurfaceType::Triangles);
    assert_eq!(surface.name(), "triangle_surface_1");
    assert_eq!(
        model.surface_shader(0).map(|shader| shader.name()),
        Some("triangle_shader_1")
    );
    assert_eq!(surface.indexes(), &[0, 1, 2, 3, 4, 5, 6, 7, 8]);

    for v in 0..9 {
        let f = v as f32;
        let st = (v & 2) as f32;
        assert_eq!(
            surface.xyz(v),
            Some(Vec3::new(10.0 + f * 10.0, 20.0 + f * 10.0, 30.0 + f * 10.0))
        );
        assert_eq!(surface.normal(v), Some(Vec3::new(1.0, 1.0, 0.0)));
        assert_eq!(surface.st(0, v), Some(Vec2::new(st, st)));
        assert_eq!(surface.color(0, v), Some(white));
    }

    model.free();
}

#[test]
fn shader_defaults() {
    let mut model = Model::new();
    let shader = model.new_shader().unwrap();
    let shader = model.shader_mut(shader.index()).unwrap();

    assert_eq!(shader.name(), "");
    assert_eq!(shader.ambient_color(), RGBA8::new(0, 0, 0, 0));
    assert_eq!(shader.diffuse_color(), RGBA8::new(255, 255, 255, 255));
    assert_eq!(shader.specular_color(), RGBA8::new(0, 0, 0, 0));
    assert!(shader.transparency().abs() < f32::EPSILON);

    shader.set_map_name("textures/box.tga");
    shader.set_transparency(0.5);
    shader.set_shininess(8.0);
    assert_eq!(shader.map_name(), "textures/box.tga");
    assert!((shader.shininess() - 8.0).abs() < f32::EPSILON);
}
