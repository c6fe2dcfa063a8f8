//! cargo run --example subsample -- <input.glb> <output.glb> [config.json]

use std::path::PathBuf;

use glb_subsample::{SubsampleConfig, subsample_file};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut args = std::env::args_os().skip(1);
    let src: PathBuf = args.next().ok_or("missing input path")?.into();
    let dst: PathBuf = args.next().ok_or("missing output path")?.into();
    let config = match args.next() {
        Some(path) => SubsampleConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => SubsampleConfig::default(),
    };

    let mut selector = config.selector()?;
    let kept = subsample_file(&src, &dst, &mut selector)?;
    println!("Done. Subsampled GLB written to: {} | Points kept: {kept}", dst.display());
    Ok(())
}
