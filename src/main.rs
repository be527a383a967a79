mod builder;
mod data;
mod errors;
mod etl;

use std::env;
use std::fs::{create_dir_all, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::data::graph::RoadGraph;
use crate::errors::Result;
use crate::etl::Etl;
use crate::etl::build_graph::{BuildGraphEtl, OUTPUT_FILE_NAME};

#[derive(Deserialize)]
pub struct UserConfig {
    pub data_path: String,
}

fn load_user_config(path: &str) -> UserConfig {
    let file = File::open(path).expect("Could not open config file.");
    serde_json::from_reader(file).expect("Could not parse config.")
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = Path::new("output").join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging() {
    Builder::with_level("info")
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    setup_logging();

    let config_path = env::args().nth(1)
        .unwrap_or_else(|| "config/graph.json".to_string());
    let user_config = load_user_config(&config_path);

    let output_dir = create_output_dir(&user_config)?;
    let mut etl = BuildGraphEtl::new(&user_config);
    etl.process(&output_dir)?;

    let output_path = output_dir.join(OUTPUT_FILE_NAME);
    let mut fin = File::open(output_path).expect("Could not open graph cache file.");
    let mut buf_vec: Vec<u8> = Vec::new();
    fin.read_to_end(&mut buf_vec).expect("Could not read graph cache.");
    let graph: RoadGraph = unsafe {
        rkyv::from_bytes_unchecked(&buf_vec).expect("Could not deserialize graph cache.")
    };
    info!(
        vertices = graph.vertex_count(),
        ways = graph.way_count(),
        arcs = graph.arc_count();
        "Road graph ready"
    );

    Ok(())
}
