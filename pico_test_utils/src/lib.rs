mod formats;

use std::{
    fs::File,
    io::{BufReader, ErrorKind},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use approx::relative_eq;
use serde::Deserialize;
use serde_json::de::from_reader;
use walkdir::WalkDir;

use pico_model::{
    host::{Allocator, PrintLevel, PrintSink},
    Model, Vec3,
};

pub use formats::{
    quad_md3, quad_mdc, quad_mdl, Md3File, Md3Surface, Md3Tag, Md3Vertex, MdcDelta, MdcFile,
    MdcSurface, MdlFile, MdlFrame, MdlSimpleFrame, MdlSkin, MdlTexCoord, MdlTriangle,
};

/// Counts allocator calls, optionally refusing every request after a number of grants.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    allocs: AtomicUsize,
    frees: AtomicUsize,
    live_bytes: AtomicUsize,
    limit: Option<usize>,
}

impl CountingAllocator {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn refusing_after(grants: usize) -> Arc<Self> {
        Arc::new(Self {
            limit: Some(grants),
            ..Self::default()
        })
    }

    pub fn allocs(&self) -> usize {
        self.allocs.load(Ordering::SeqCst)
    }

    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::SeqCst)
    }

    /// Asserts that everything granted was given back.
    pub fn assert_balanced(&self) {
        assert_eq!(self.allocs(), self.frees(), "alloc and free counts differ");
        assert_eq!(self.live_bytes(), 0, "bytes still live");
    }
}

impl Allocator for CountingAllocator {
    fn alloc(&self, size: usize) -> bool {
        if self.limit.map_or(false, |limit| self.allocs() >= limit) {
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

/// Keeps every diagnostic it receives.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<(PrintLevel, String)>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(PrintLevel, String)> {
        self.messages
            .lock()
            .expect("the mutex shouldn't be poisoned")
            .clone()
    }

    pub fn levels(&self) -> Vec<PrintLevel> {
        self.messages().into_iter().map(|(level, _)| level).collect()
    }

    pub fn contains(&self, level: PrintLevel, needle: &str) -> bool {
        self.messages()
            .iter()
            .any(|(l, message)| *l == level && message.contains(needle))
    }
}

impl PrintSink for RecordingSink {
    fn print(&self, level: PrintLevel, message: &str) {
        self.messages
            .lock()
            .expect("the mutex shouldn't be poisoned")
            .push((level, message.to_owned()));
    }
}

/// Expected contents of a loaded model, stored as JSON next to a model file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    pub name: Option<String>,
    pub num_frames: Option<usize>,
    pub surfaces: Vec<SurfaceSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurfaceSpec {
    pub name: String,
    pub shader: Option<String>,
    pub num_vertexes: usize,
    pub num_indexes: usize,
    #[serde(default)]
    pub xyz: Vec<[f32; 3]>,
    #[serde(default)]
    pub normals: Vec<[f32; 3]>,
}

impl ModelSpec {
    pub fn verify(&self, model: &Model) {
        if let Some(name) = &self.name {
            assert_eq!(model.name(), name, "model name");
        }
        if let Some(num_frames) = self.num_frames {
            assert_eq!(model.num_frames(), num_frames, "frame count");
        }

        assert_eq!(model.num_surfaces(), self.surfaces.len(), "surface count");

        for (i, (surface, spec)) in model.surfaces().zip(&self.surfaces).enumerate() {
            assert_eq!(surface.name(), spec.name, "surface {i} name");
            if let Some(shader) = &spec.shader {
                assert_eq!(
                    model.surface_shader(i).map(|shader| shader.name()),
                    Some(shader.as_str()),
                    "surface {i} shader"
                );
            }
            assert_eq!(surface.num_vertexes(), spec.num_vertexes, "surface {i} vertex count");
            assert_eq!(surface.num_indexes(), spec.num_indexes, "surface {i} index count");

            for (v, (&got, expected)) in surface.xyzs().iter().zip(&spec.xyz).enumerate() {
                assert_vec_eq(got, *expected, &format!("surface {i} vertex {v} position"));
            }
            for (v, (&got, expected)) in surface.normals().iter().zip(&spec.normals).enumerate() {
                assert_vec_eq(got, *expected, &format!("surface {i} vertex {v} normal"));
            }
        }
    }
}

fn assert_vec_eq(got: Vec3, expected: [f32; 3], what: &str) {
    let expected = Vec3::from(expected);
    assert!(
        relative_eq!(got, expected, epsilon = 0.001),
        "{what}: got {got}, expected {expected}"
    );
}

pub trait FileSpec
where
    for<'de> Self: Deserialize<'de>,
{
    type Type;

    fn extension() -> &'static str;

    fn read(path: &Path) -> Self::Type;

    fn verify(&self, data: Self::Type);

    fn verify_from_path(path: &Path) {
        let files = discover_test_files(path, Self::extension());

        for file in files {
            let spec_path = file.path.with_extension("json");

            let spec_file = match File::open(spec_path) {
                Ok(f) => f,
                Err(e) => {
                    if e.kind() == ErrorKind::NotFound {
                        continue;
                    }
                    Err(e).unwrap()
                }
            };

            eprintln!("Verifying against {}", file.name);

            let data = Self::read(&file.path);
            let spec: Self = from_reader(BufReader::new(spec_file)).unwrap();

            spec.verify(data);
        }
    }
}

struct TestFile {
    name: String,
    path: PathBuf,
}

fn discover_test_files(path: &Path, extension: &str) -> Vec<TestFile> {
    let mut files = Vec::new();

    for result in WalkDir::new(path) {
        let entry = result.unwrap();

        let file_name = entry.path().strip_prefix(path).unwrap();
        let name_with_ext = file_name.to_string_lossy();
        let Some(name) = name_with_ext.strip_suffix(extension) else {
            continue;
        };

        files.push(TestFile {
            name: name.to_owned(),
            path: entry.into_path(),
        });
    }

    files
}

/// Every file under `path` with the given extension, for sweeping a local asset directory.
pub fn asset_files(path: &Path, extension: &str) -> Vec<PathBuf> {
    discover_test_files(path, extension)
        .into_iter()
        .map(|file| file.path)
        .collect()
}

/// Directory of local test assets, taken from `PICO_TEST_ASSETS`.
pub fn assets_dir() -> Option<PathBuf> {
    std::env::var_os("PICO_TEST_ASSETS").map(PathBuf::from)
}
