//! # reel-core
//!
//! Foundation types shared by every reel crate:
//!
//! - **Constants**: default ports, timeouts, and frame file naming
//! - **Requests**: [`CaptureRequest`] with its validation rules
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber
//! - **Paths**: [`paths::is_executable`] for tool discovery

#![deny(unsafe_code)]

pub mod constants;
pub mod logging;
pub mod paths;
pub mod request;

pub use request::{CaptureRequest, RequestError, split_browser_args};
