//! index-summary prints the demultiplexing summary of a sequencing run as
//! CSV, per lane or per barcode, or the per-tile indexing table.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use clap::{Arg, App, value_t};

use common::batch::table_for_run;
use common::index_table::{index_summary_table, indexing_table, IndexLevel, IndexSummaryOptions};
use common::metric_group::{index_metrics_to_load, MetricGroup};
use common::run_loader::ReadOptions;


/// Parses command line arguments and writes the index table
fn main() {
     env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

     let matches = App::new("index-summary")
          .version(clap::crate_version!())
          .arg(Arg::with_name("run-path")
               .long("run-path")
               .help("specify path to the sequencing run folder")
               .takes_value(true)
               .required(true))
          .arg(Arg::with_name("level")
               .long("level")
               .help("summary level: Lane or Barcode")
               .default_value("Lane")
               .takes_value(true))
          .arg(Arg::with_name("columns")
               .long("columns")
               .help("comma separated list of columns to report")
               .takes_value(true))
          .arg(Arg::with_name("keep-missing")
               .long("keep-missing")
               .help("keep columns without values instead of dropping them"))
          .arg(Arg::with_name("indexing")
               .long("indexing")
               .help("write the per-tile indexing table instead of the summary"))
          .arg(Arg::with_name("per-tile")
               .long("per-tile")
               .requires("indexing")
               .help("one indexing row per tile rather than per sample"))
          .arg(Arg::with_name("output")
               .long("output")
               .help("CSV file to write, standard output by default")
               .takes_value(true))
          .get_matches();

     let run_path = PathBuf::from(matches.value_of("run-path").unwrap());
     if !run_path.exists() {
          panic!("Could not find run path {}", run_path.display());
     }

     let options = IndexSummaryOptions {
          level: value_t!(matches, "level", IndexLevel).unwrap_or_else(|e| e.exit()),
          columns: matches.value_of("columns")
               .map(|c| c.split(',').map(|s| s.trim().to_owned()).collect()),
          ignore_missing_columns: !matches.is_present("keep-missing"),
     };
     let indexing = matches.is_present("indexing");
     let per_sample = !matches.is_present("per-tile");

     let read_options = ReadOptions::with_mask(index_metrics_to_load())
          .require(&[MetricGroup::Index, MetricGroup::Tile]);
     let table = table_for_run(&run_path, &read_options, |run| {
          if indexing {
               indexing_table(run, per_sample)
          } else {
               index_summary_table(run, &options)
          }
     });
     let table = match table {
          Ok(t) => t,
          Err(e) => panic!("Error building index table: {}", e),
     };

     let mut output: Box<dyn Write> = match matches.value_of("output") {
          Some(path) => Box::new(File::create(path)
               .unwrap_or_else(|e| panic!("Error creating output file {}: {}", path, e))),
          None => Box::new(io::stdout()),
     };
     table.write_csv(&mut output)
          .unwrap_or_else(|e| panic!("Error writing output: {}", e));
}
