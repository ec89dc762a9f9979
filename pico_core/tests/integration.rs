use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use approx::assert_relative_eq;
use glam::{Vec2, Vec3};

use pico_core::{
    host::{Host, MemoryFileLoader, PrintLevel},
    load_model_from_bytes, load_model_with,
    model::FileType,
    Error, ErrorKind, Model,
};
use pico_test_utils::{
    quad_md3, quad_mdc, quad_mdl, CountingAllocator, Md3File, ModelSpec, RecordingSink,
};

const MDL_PATH: &str = "../tests/assets/model.mdl";

fn files() -> MemoryFileLoader {
    let files = MemoryFileLoader::new();
    files.insert("models/quad.md3", quad_md3().to_bytes());
    files.insert("models/quad.mdc", quad_mdc().to_bytes());
    files.insert(MDL_PATH, quad_mdl().to_bytes());
    files.insert("models/garbage.md3", vec![0_u8; 256]);
    files.insert(
        "models/future.md3",
        Md3File {
            version: Some(16),
            ..quad_md3()
        }
        .to_bytes(),
    );
    let truncated = quad_md3().to_bytes();
    files.insert("models/truncated.md3", &truncated[..truncated.len() - 8]);
    files
}

fn host() -> (Host, RecordingSink) {
    let sink = RecordingSink::new();
    let host = Host::new()
        .with_file_loader(files())
        .with_print_sink(sink.clone());
    (host, sink)
}

#[test]
fn md3_quad() {
    let (host, _) = host();
    let model = load_model_with(&host, "models/quad.md3", 0).unwrap();

    assert_eq!(model.module().unwrap().id, "md3");
    assert_eq!(model.num_surfaces(), 1);
    assert_eq!(model.num_shaders(), 1);

    let surface = model.surface(0).unwrap();
    assert_eq!(surface.name(), "surf0");
    assert_eq!(model.surface_shader(0).unwrap().name(), "myshader_1");
    assert_eq!(surface.num_vertexes(), 4);
    assert_eq!(surface.num_indexes(), 6);
    for i in 0..4 {
        assert_relative_eq!(surface.normal(i).unwrap(), Vec3::Y, epsilon = 0.001);
    }
}

#[test]
fn mdc_quad() {
    let (host, _) = host();
    let model = load_model_with(&host, "models/quad.mdc", 0).unwrap();

    assert_eq!(model.module().unwrap().id, "mdc");
    let surface = model.surface(0).unwrap();
    assert_eq!(surface.name(), "surf0");
    assert_eq!(model.surface_shader(0).unwrap().name(), "myshader_1");

    let xyz = [
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
    ];
    let st = [
        Vec2::new(0.0, 1.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
    ];
    for i in 0..4 {
        assert_relative_eq!(surface.xyz(i).unwrap(), xyz[i]);
        assert_relative_eq!(surface.normal(i).unwrap(), Vec3::Z, epsilon = 0.001);
        assert_eq!(surface.st(0, i).unwrap(), st[i]);
    }
}

#[test]
fn mdl_quad() {
    let (host, _) = host();
    let model = load_model_with(&host, MDL_PATH, 0).unwrap();

    assert_eq!(model.module().unwrap().id, "mdl");
    assert_eq!(model.num_surfaces(), 1);
    assert_eq!(model.num_shaders(), 1);
    assert_eq!(
        model.surface_shader(0).unwrap().name(),
        "../tests/assets/model_img"
    );

    let surface = model.surface(0).unwrap();
    assert_eq!(surface.num_vertexes(), 6);
    assert_eq!(surface.num_indexes(), 6);
}

#[test]
fn matches_json_spec() {
    let spec: ModelSpec = serde_json::from_str(
        r#"{
            "name": "quad",
            "num_frames": 2,
            "surfaces": [
                {
                    "name": "surf0",
                    "shader": "myshader_1",
                    "num_vertexes": 4,
                    "num_indexes": 6,
                    "xyz": [[0, -1, 0], [2, -1, 0], [0, 1, 0], [2, 1, 0]],
                    "normals": [[0, 0, 1], [0, 0, 1], [0, 0, 1], [0, 0, 1]]
                }
            ]
        }"#,
    )
    .unwrap();

    let (host, _) = host();
    spec.verify(&load_model_with(&host, "models/quad.mdc", 1).unwrap());
}

#[test]
fn from_bytes() {
    let model =
        load_model_from_bytes(&Host::new(), "quad.md3", &quad_md3().to_bytes(), 0).unwrap();
    assert_eq!(model.name(), "quad");
    assert_eq!(model.file_name(), "quad.md3");
}

#[test]
fn manual_build() {
    let mut model = Model::new();
    model.set_name("manual");

    let shader = model.new_shader().unwrap();
    model.shader_mut(shader.index()).unwrap().set_name("stone");
    let id = model.new_surface().unwrap();
    model.set_surface_shader(id, Some(shader)).unwrap();

    let surface = model.surface_mut(id.index()).unwrap();
    surface.set_type(pico_core::SurfaceType::Triangles);
    for (i, xyz) in [Vec3::ZERO, Vec3::X, Vec3::Y].into_iter().enumerate() {
        surface.set_xyz(i, xyz).unwrap();
        surface.set_normal(i, Vec3::Z).unwrap();
        surface.set_st(0, i, xyz.truncate()).unwrap();
        surface.set_index(i, i as u32).unwrap();
    }

    assert_eq!(surface.num_vertexes(), 3);
    assert_eq!(surface.num_indexes(), 3);
    assert_eq!(surface.num_st_arrays(), 1);
    model.verify().unwrap();
}

#[test]
fn no_file_loader() {
    let sink = RecordingSink::new();
    let host = Host::new().with_print_sink(sink.clone());

    let err = load_model_with(&host, "models/quad.md3", 0).unwrap_err();
    assert_eq!(err, Error::NoFileLoader);
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(sink.levels(), [PrintLevel::Error]);
}

#[test]
fn missing_file() {
    let (host, sink) = host();

    let err = load_model_with(&host, "models/missing.md3", 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(sink.contains(PrintLevel::Error, "models/missing.md3"));
}

#[test]
fn unknown_format() {
    let (host, sink) = host();

    let err = load_model_with(&host, "models/garbage.md3", 0).unwrap_err();
    assert_eq!(err, Error::UnknownFormat(String::from("models/garbage.md3")));
    assert_eq!(sink.levels(), [PrintLevel::Warning]);
}

#[test]
fn unsupported_version() {
    let (host, sink) = host();

    let err = load_model_with(&host, "models/future.md3", 0).unwrap_err();
    assert_eq!(
        err,
        Error::UnsupportedVersion {
            ty: FileType::Md3,
            version: 16
        }
    );
    assert_eq!(err.kind(), ErrorKind::Malformed);
    assert_eq!(sink.levels(), [PrintLevel::Error]);
}

#[test]
fn truncated() {
    let (host, sink) = host();

    let err = load_model_with(&host, "models/truncated.md3", 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);
    assert!(sink.levels().contains(&PrintLevel::Error));
}

#[test]
fn short_header() {
    let mut md3 = b"IDP3".to_vec();
    md3.extend_from_slice(&15_i32.to_le_bytes());
    md3.extend_from_slice(&[0; 40]);
    let mut mdl = b"IDPO".to_vec();
    mdl.extend_from_slice(&6_i32.to_le_bytes());

    for (name, bytes, ty) in [
        ("short.md3", md3, FileType::Md3),
        ("short.mdl", mdl, FileType::Mdl),
    ] {
        let (host, sink) = host();

        let err = load_model_from_bytes(&host, name, &bytes, 0).unwrap_err();
        assert_eq!(
            err,
            Error::Corrupted {
                ty,
                error: "eof reading header"
            }
        );
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(sink.levels(), [PrintLevel::Error]);
    }
}

#[test]
fn bad_frame() {
    let (host, sink) = host();

    let err = load_model_with(&host, "models/quad.md3", 5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFrame);
    assert_eq!(sink.levels(), [PrintLevel::Warning]);
}

#[test]
fn print_threshold() {
    let (host, sink) = host();
    let host = host.with_print_level(PrintLevel::Error);

    load_model_with(&host, "models/quad.md3", 5).unwrap_err();
    assert!(sink.messages().is_empty());
}

#[test]
fn out_of_memory() {
    let allocator = CountingAllocator::refusing_after(0);
    let (host, sink) = host();
    let host = host.with_allocator(allocator.clone());

    let err = load_model_with(&host, "models/quad.md3", 0).unwrap_err();
    assert_eq!(err, Error::OutOfMemory);
    assert_eq!(sink.levels(), [PrintLevel::Error, PrintLevel::Fatal]);
    allocator.assert_balanced();
}

#[test]
fn storage_is_balanced() {
    let allocator = CountingAllocator::new();
    let (host, _) = host();
    let host = host.with_allocator(allocator.clone());

    for path in ["models/quad.md3", "models/quad.mdc", MDL_PATH] {
        let model = load_model_with(&host, path, 0).unwrap();
        assert!(allocator.live_bytes() > 0);
        drop(model);
        allocator.assert_balanced();
    }
}

#[test]
fn file_released_once() {
    let released = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&released);
    let (host, _) = host();
    let host = host.with_file_releaser(move |buffer: Vec<u8>| {
        counter.fetch_add(1, Ordering::SeqCst);
        drop(buffer);
    });

    load_model_with(&host, "models/quad.md3", 0).unwrap();
    assert_eq!(released.load(Ordering::SeqCst), 1);

    load_model_with(&host, "models/truncated.md3", 0).unwrap_err();
    assert_eq!(released.load(Ordering::SeqCst), 2);

    load_model_with(&host, "models/quad.md3", 9).unwrap_err();
    assert_eq!(released.load(Ordering::SeqCst), 3);

    load_model_with(&host, "models/missing.md3", 0).unwrap_err();
    assert_eq!(released.load(Ordering::SeqCst), 3);
}

// the global host is shared by every test, so it's exercised in one place
#[test]
fn global_host() {
    pico_core::reset_host();
    assert!(!pico_core::host().has_file_loader());
    assert_eq!(
        pico_core::load_model("models/quad.md3", 0).unwrap_err(),
        Error::NoFileLoader
    );

    let sink = RecordingSink::new();
    pico_core::set_file_loader(files());
    pico_core::set_print_sink(sink.clone());
    pico_core::set_print_level(PrintLevel::Warning);

    let model = pico_core::load_model("models/quad.md3", 0).unwrap();
    assert_eq!(model.name(), "quad");

    pico_core::load_model("models/quad.md3", 3).unwrap_err();
    assert_eq!(sink.levels(), [PrintLevel::Warning]);

    let allocator = CountingAllocator::refusing_after(0);
    pico_core::set_allocator(allocator.clone());
    assert_eq!(
        pico_core::load_model("models/quad.md3", 0).unwrap_err(),
        Error::OutOfMemory
    );

    pico_core::set_file_releaser(|_buffer: Vec<u8>| {});
    pico_core::reset_host();
    assert!(!pico_core::host().has_file_loader());
    assert_eq!(pico_core::host().print_level(), PrintLevel::Verbose);
}
