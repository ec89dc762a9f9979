use std::fs;

use pico_mdl::{Mdl, MdlModule, Palette};
use pico_model::{host::Host, Module};
use pico_test_utils::{asset_files, assets_dir, quad_mdl, CountingAllocator};

#[test]
fn skin_to_image() {
    let bytes = quad_mdl().to_bytes();
    let mdl = Mdl::new(&bytes);
    let header = mdl.header().unwrap();
    let contents = header.contents().unwrap();
    let (width, height) = header.skin_size().unwrap();

    let image = Palette::grayscale()
        .to_image(
            width.try_into().unwrap(),
            height.try_into().unwrap(),
            contents.skins[0].image().unwrap(),
        )
        .unwrap();

    assert_eq!(image.dimensions(), (8, 8));
    assert_eq!(image.get_pixel(1, 1).0, [9, 9, 9, 255]);
}

#[test]
fn storage_is_given_back() {
    let allocator = CountingAllocator::new();
    let host = Host::new().with_allocator(allocator.clone());

    let model = MdlModule
        .load("model.mdl", 0, &quad_mdl().to_bytes(), &host)
        .unwrap();
    model.free();

    allocator.assert_balanced();
}

/// Loads every model under `PICO_TEST_ASSETS`
#[test]
#[ignore]
fn read_assets() {
    let dir = assets_dir().expect("PICO_TEST_ASSETS should be set");
    let host = Host::new();

    for path in asset_files(&dir, ".mdl") {
        eprintln!("reading {}", path.display());
        let bytes = fs::read(&path).unwrap();

        match MdlModule.load(&path.to_string_lossy(), 0, &bytes, &host) {
            Ok(model) => model.verify().unwrap(),
            // ignore errors, the asset may be broken
            Err(err) => eprintln!("failed: {}", err),
        }
    }
}
