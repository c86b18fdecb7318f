extern crate log;
extern crate pretty_env_logger;

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use log::{
    info,
    warn,
};
use peakmesh::alignment::ConsensusBuilder;
use peakmesh::engine::{
    build_thread_pool,
    SimilarityEngine,
};
use peakmesh::io;
use peakmesh::peaks::PeakArena;
use peakmesh::utils;
use peakmesh::Config;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    config: String,
    #[arg(short, long, default_value = "peakmesh_output")]
    output_dir: String,
    #[arg(long, action)]
    write_template: bool,
    /// Peak list files to align (.json)
    files: Vec<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    if args.write_template {
        let config_str = Config::default().to_toml()?;
        let out_path = args.config;
        if fs::metadata(&out_path).is_ok() {
            return Err(format!("File already exists: {}", out_path).into());
        }
        fs::write(&out_path, config_str)?;
        println!("Wrote default config to {}", out_path);
        return Ok(());
    }

    let config = Config::from_toml(&args.config)?;

    pretty_env_logger::init();

    if args.files.len() < 2 {
        warn!(
            "Only {} peak list(s) given, nothing will be matched",
            args.files.len()
        );
    }

    let out_path_dir = Path::new(&args.output_dir);
    if !out_path_dir.exists() {
        fs::create_dir_all(out_path_dir)?;
    }
    let out_paths = config.output_config.resolve(out_path_dir);

    let samples = args
        .files
        .iter()
        .map(|path| io::read_peak_list_json(path))
        .collect::<Result<Vec<_>, _>>()?;
    let arena = PeakArena::new(samples)?;

    let npeaks = utils::get_stats(
        &arena
            .samples()
            .iter()
            .map(|s| s.len() as f64)
            .collect::<Vec<_>>(),
    );
    info!("Peaks per sample: {:?}", npeaks);

    let alignment = config.alignment();
    alignment.validate()?;
    let pool = Arc::new(build_thread_pool(alignment.engine.num_threads)?);
    let engine = SimilarityEngine::new(alignment.engine, alignment.similarity.build()?, pool)?;
    let similarities = engine.compute_all(&arena)?;
    info!("Engine report: {:?}", similarities.report());
    let index = similarities.to_index(&arena);

    let builder = ConsensusBuilder::from_config(alignment.clique)?;
    let result = builder.build(arena, &index);
    info!(
        "{} cliques, {} matched and {} unmatched peaks",
        result.stats().num_cliques,
        result.stats().matched_peaks,
        result.stats().unmatched_peaks
    );

    if let Some(path) = out_paths.cliques_csv {
        io::write_cliques_csv_file(&result, path)?;
    }
    if let Some(path) = out_paths.unmatched_csv {
        io::write_unmatched_csv_file(&result, path)?;
    }
    if let Some(path) = out_paths.summary_json {
        io::write_summary_json_file(&result, path)?;
    }

    Ok(())
}
