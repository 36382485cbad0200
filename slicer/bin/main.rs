use std::{
    fs::File,
    io::{stdout, BufReader, BufWriter, Write},
    thread,
    time::Instant,
};

use anyhow::{anyhow, Context, Result};
use args::Args;
use clap::Parser;
use tracing_subscriber::{
    filter::{self, LevelFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use slice_archive::SliceArchive;
use slicer::{mesh::load_mesh, plane::Plane, session::Slicer};

mod args;

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target("slicer", level)
        .with_target("slice_archive", level)
        .with_target("common", level);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.slice_config()?;
    let pixel = config.pixel_size();
    println!(
        "Printer: {}x{} px of {:.3}x{:.3} mm, {} slices in #{}",
        config.platform_resolution.x,
        config.platform_resolution.y,
        pixel.x,
        pixel.y,
        config.pixel_format.name(),
        config.slice_color.to_hex()
    );

    let ext = args.mesh.extension().unwrap_or_default().to_string_lossy();
    let file = File::open(&args.mesh)
        .with_context(|| format!("Failed to open `{}`", args.mesh.display()))?;
    let mut mesh = load_mesh(BufReader::new(file), &ext)?;

    mesh.set_scale(args.scale);
    mesh.set_rotation(args.rotation.map(f32::to_radians));
    mesh.align(&Plane::new(config.plane_tilt), config.platform_size.y)?;

    println!(
        "Loaded `{}`. {{ face: {} }}",
        args.mesh.display(),
        mesh.face_count()
    );

    let bounds = mesh.bounds()?;
    let half = config.platform_size / 2.0;
    if bounds.min.x < -half.x
        || bounds.min.y < -half.y
        || bounds.max.x > half.x
        || bounds.max.y > half.y
    {
        println!(" \\ Model extends outside of the print area and will be cut off.");
    }

    let now = Instant::now();
    let mut slicer = Slicer::new(mesh, config.clone());
    slicer.start()?;
    let progress = slicer.progress();

    // Slices are produced and written on another thread so this one can
    // report progress.
    let (output, max_slices) = (args.output.clone(), args.max_slices);
    let worker = thread::spawn(move || -> Result<u32> {
        let file = File::create(&output)
            .with_context(|| format!("Failed to create `{}`", output.display()))?;
        let mut archive = SliceArchive::new(BufWriter::new(file), config.pixel_format);

        while let Some(layer) = slicer.next() {
            archive.add_slice(&layer.image)?;
            if max_slices.is_some_and(|max| archive.count() >= max) {
                slicer.cancel();
            }
        }

        let (mut writer, count) = archive.finish()?;
        writer.flush()?;
        Ok(count)
    });

    while !progress.is_finished() && !worker.is_finished() {
        let completed = progress.wait();
        print!(
            "\rLayer: {}/{}, {:.1}%",
            completed,
            progress.total(),
            progress.progress() * 100.0
        );
        stdout().flush()?;
    }

    let count = worker
        .join()
        .map_err(|_| anyhow!("Slicing thread panicked"))??;

    println!(
        "\nDone. Wrote {count} slices to `{}`. Elapsed: {:.1}s",
        args.output.display(),
        now.elapsed().as_secs_f32()
    );

    Ok(())
}
