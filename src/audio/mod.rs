//! Audio assembly: MP3 segment stitching and paced stream delivery

pub mod assembler;
pub mod mp3;

pub use assembler::{AudioStreamer, PacingConfig, StreamEnd};
