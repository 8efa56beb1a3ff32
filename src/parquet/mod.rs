//! Handles serialising and saving data to disk in the _parquet_ file format.

pub mod yearly;

pub use yearly::save_yearly;
