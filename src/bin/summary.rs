//! summary prints the run summary table of one or more sequencing runs as
//! CSV, at the total, non-index, read, lane or surface level.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use clap::{Arg, App, value_t};

use common::batch::summarize_runs;
use common::summary_table::{SummaryLevel, SummaryOptions};

use rayon::ThreadPoolBuilder;


/// Parses command line arguments and writes one summary table per run
fn main() {
     env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

     let matches = App::new("summary")
          .version(clap::crate_version!())
          .arg(Arg::with_name("run-path")
               .long("run-path")
               .help("path to a sequencing run folder, may be repeated")
               .takes_value(true)
               .multiple(true)
               .number_of_values(1)
               .required(true))
          .arg(Arg::with_name("level")
               .long("level")
               .help("summary level: Total, NonIndex, Read, Lane or Surface")
               .default_value("Total")
               .takes_value(true))
          .arg(Arg::with_name("columns")
               .long("columns")
               .help("comma separated list of columns to report")
               .takes_value(true))
          .arg(Arg::with_name("keep-missing")
               .long("keep-missing")
               .help("keep columns without values instead of dropping them"))
          .arg(Arg::with_name("threads")
               .long("threads")
               .help("number of runs summarized at a time")
               .default_value("4")
               .takes_value(true))
          .arg(Arg::with_name("output")
               .long("output")
               .help("CSV file to write, standard output by default")
               .takes_value(true))
          .get_matches();

     let run_paths: Vec<PathBuf> = matches.values_of("run-path").unwrap().map(PathBuf::from).collect();
     let level = value_t!(matches, "level", SummaryLevel).unwrap_or_else(|e| e.exit());
     let threads = value_t!(matches, "threads", usize).unwrap_or_else(|e| e.exit());

     let options = SummaryOptions {
          level,
          columns: matches.value_of("columns")
               .map(|c| c.split(',').map(|s| s.trim().to_owned()).collect()),
          ignore_missing_columns: !matches.is_present("keep-missing"),
     };

     ThreadPoolBuilder::new().num_threads(threads).build_global()
          .unwrap_or_else(|e| panic!("Error configuring global threadpool: {}", e));

     let mut output: Box<dyn Write> = match matches.value_of("output") {
          Some(path) => Box::new(File::create(path)
               .unwrap_or_else(|e| panic!("Error creating output file {}: {}", path, e))),
          None => Box::new(io::stdout()),
     };

     let tables = summarize_runs(&run_paths, &options);
     for (run_path, table) in run_paths.iter().zip(tables) {
          let table = match table {
               Ok(t) => t,
               Err(e) => panic!("Error building summary table for {}: {}", run_path.display(), e),
          };
          if run_paths.len() > 1 {
               writeln!(output, "# {}", run_path.display())
                    .unwrap_or_else(|e| panic!("Error writing output: {}", e));
          }
          table.write_csv(&mut output)
               .unwrap_or_else(|e| panic!("Error writing output: {}", e));
     }
}
