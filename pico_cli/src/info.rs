use clap::Parser;

use pico_core::Result;

/// Print a summary of a model
#[derive(Parser)]
pub struct Info {
    path: String,
    #[clap(short, long, default_value_t = 0)]
    frame: usize,
}

pub fn info(opts: &Info) -> Result<()> {
    let model = pico_core::load_model(&opts.path, opts.frame)?;

    println!("name:     {}", model.name());
    if let Some(module) = model.module() {
        println!("format:   {}", module.display_name);
    }
    println!("frame:    {} of {}", model.frame_num(), model.num_frames());
    if let Some((min, max)) = model.bounds() {
        println!("bounds:   {} .. {}", min, max);
    }

    println!("shaders:  {}", model.num_shaders());
    for shader in model.shaders() {
        if shader.map_name().is_empty() {
            println!("  {}", shader.name());
        } else {
            println!("  {} ({})", shader.name(), shader.map_name());
        }
    }

    println!("surfaces: {}", model.num_surfaces());
    for (i, surface) in model.surfaces().enumerate() {
        println!(
            "  {} [{}] shader `{}`: {} vertexes, {} indexes",
            surface.name(),
            surface.ty(),
            model.surface_shader(i).map_or("", |shader| shader.name()),
            surface.num_vertexes(),
            surface.num_indexes(),
        );
    }

    Ok(())
}
