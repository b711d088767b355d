//! Volume file readers

pub mod vol_file;

pub use vol_file::{parse_vol_header, VolFile, VolFileError, VolHeader, VOL_HEADER_SIZE, VOL_MAGIC};
