//! imaging-table prints one row per lane, tile and cycle of a sequencing run
//! with every per-cycle metric, as CSV.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use clap::{Arg, App};

use common::batch::table_for_run;
use common::imaging_table::imaging_table;
use common::metric_group::imaging_metrics_to_load;
use common::run_loader::ReadOptions;


/// Parses command line arguments and writes the imaging table
fn main() {
     env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

     let matches = App::new("imaging-table")
          .version(clap::crate_version!())
          .arg(Arg::with_name("run-path")
               .long("run-path")
               .help("specify path to the sequencing run folder")
               .takes_value(true)
               .required(true))
          .arg(Arg::with_name("output")
               .long("output")
               .help("CSV file to write, standard output by default")
               .takes_value(true))
          .get_matches();

     let run_path = PathBuf::from(matches.value_of("run-path").unwrap());
     if !run_path.exists() {
          panic!("Could not find run path {}", run_path.display());
     }

     let read_options = ReadOptions::with_mask(imaging_metrics_to_load());
     let table = match table_for_run(&run_path, &read_options, imaging_table) {
          Ok(t) => t,
          Err(e) => panic!("Error building imaging table: {}", e),
     };

     let mut output: Box<dyn Write> = match matches.value_of("output") {
          Some(path) => Box::new(File::create(path)
               .unwrap_or_else(|e| panic!("Error creating output file {}: {}", path, e))),
          None => Box::new(io::stdout()),
     };
     table.write_csv(&mut output)
          .unwrap_or_else(|e| panic!("Error writing output: {}", e));
}
