use std::{fs, path::Path, process};

use serde::Deserialize;

use pico_core::{host::Host, load_model_with, Model};
use pico_test_utils::{assets_dir, quad_md3, quad_mdc, FileSpec, ModelSpec};

/// A model spec stored as `<model>.json` next to the model file.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct Spec<const MDC: bool>(ModelSpec);

impl<const MDC: bool> FileSpec for Spec<MDC> {
    type Type = Model;

    fn extension() -> &'static str {
        if MDC {
            ".mdc"
        } else {
            ".md3"
        }
    }

    fn read(path: &Path) -> Model {
        load_model_with(&Host::with_std_fs(), &path.to_string_lossy(), 0).unwrap()
    }

    fn verify(&self, model: Model) {
        self.0.verify(&model);
    }
}

#[test]
fn verify_written_files() {
    let dir = std::env::temp_dir().join(format!("pico_core_specs_{}", process::id()));
    fs::create_dir_all(dir.join("nested")).unwrap();

    fs::write(dir.join("quad.md3"), quad_md3().to_bytes()).unwrap();
    fs::write(
        dir.join("quad.json"),
        r#"{
            "name": "quad",
            "surfaces": [
                {
                    "name": "surf0",
                    "shader": "myshader_1",
                    "num_vertexes": 4,
                    "num_indexes": 6,
                    "xyz": [[-1, 0, 1], [1, 0, 1], [1, 0, -1], [-1, 0, -1]]
                }
            ]
        }"#,
    )
    .unwrap();
    fs::write(dir.join("nested/quad.mdc"), quad_mdc().to_bytes()).unwrap();
    fs::write(
        dir.join("nested/quad.json"),
        r#"{
            "num_frames": 2,
            "surfaces": [
                { "name": "surf0", "num_vertexes": 4, "num_indexes": 6 }
            ]
        }"#,
    )
    .unwrap();
    // models without a spec are skipped
    fs::write(dir.join("nested/other.md3"), quad_md3().to_bytes()).unwrap();

    Spec::<false>::verify_from_path(&dir);
    Spec::<true>::verify_from_path(&dir);

    fs::remove_dir_all(&dir).unwrap();
}

/// Checks models under `PICO_TEST_ASSETS` against their specs
#[test]
#[ignore]
fn verify_assets() {
    let dir = assets_dir().expect("PICO_TEST_ASSETS should be set");

    Spec::<false>::verify_from_path(&dir);
    Spec::<true>::verify_from_path(&dir);
}
