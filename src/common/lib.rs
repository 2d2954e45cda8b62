pub mod error;
pub mod metric_group;
pub mod metric_set;
pub mod run_info_parser;

pub mod corrected_int_decoder;
pub mod error_decoder;
pub mod extraction_decoder;
pub mod image_decoder;
pub mod index_decoder;
pub mod q_decoder;
pub mod tile_decoder;

pub mod run_loader;
pub mod run_metrics;

pub mod column_schema;
pub mod index_summary;
pub mod run_summary;

pub mod imaging_table;
pub mod index_table;
pub mod summary_table;
pub mod table;

pub mod batch;

#[cfg(test)]
mod test_fixtures;
