use clap::Parser;

use pico_core::Result;

/// Print every vertex and triangle of a model
#[derive(Parser)]
pub struct Dump {
    path: String,
    #[clap(short, long, default_value_t = 0)]
    frame: usize,
    /// Only dump the surface with this name
    #[clap(short, long)]
    surface: Option<String>,
}

pub fn dump(opts: &Dump) -> Result<()> {
    let model = pico_core::load_model(&opts.path, opts.frame)?;

    for surface in model.surfaces() {
        if let Some(filter) = &opts.surface {
            if surface.name() != filter {
                continue;
            }
        }

        println!("surface {}", surface.name());

        for i in 0..surface.num_vertexes() {
            let xyz = surface.xyz(i).unwrap_or_default();
            let normal = surface.normal(i).unwrap_or_default();
            let st = surface.st(0, i).unwrap_or_default();
            println!("  v {:>4} xyz {} normal {} st {}", i, xyz, normal, st);
        }

        for (i, triangle) in surface.indexes().chunks(3).enumerate() {
            println!("  t {:>4} {:?}", i, triangle);
        }
    }

    Ok(())
}
