//! # reel-video
//!
//! Everything after the frames are on disk: preparing the frame and output
//! directories, locating `ffmpeg`, and encoding `frame%04d.png` into an MP4
//! with an optional soundtrack.

#![deny(unsafe_code)]

pub mod error;
pub mod ffmpeg;
pub mod workspace;

pub use error::{Result, VideoError};
pub use ffmpeg::{VideoAssembler, find_ffmpeg, validate_soundtrack};
pub use workspace::{clear_directory, ensure_directory, prepare_directory};
