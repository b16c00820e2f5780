//! # reel-capture
//!
//! Frame-accurate capture of a web animation through the Chrome `DevTools`
//! Protocol.
//!
//! A [`CaptureSession`] launches a headless browser, waits for its debugging
//! endpoint, pauses every CSS animation while the page loads, resumes them,
//! then records exactly `ceil(duration × fps)` screencast frames. Each frame
//! is acknowledged before the next one is requested and handed to a
//! [`FrameSink`].

#![deny(unsafe_code)]

pub mod cdp;
pub mod chrome;
pub mod error;
pub mod probe;
pub mod progress;
pub mod scripts;
pub mod session;
pub mod sink;
pub mod types;

pub use cdp::transport::{CdpTransport, WsTransport};
pub use chrome::{BrowserProcess, BrowserState, find_chrome};
pub use error::CaptureError;
pub use progress::{BarReporter, NoopProgress, ProgressReporter};
pub use session::CaptureSession;
pub use sink::{DirectorySink, FrameSink};
pub use types::{CaptureOptions, CaptureReport, CaptureState, ScreencastOptions};
