//! Chrome `DevTools` Protocol plumbing: wire codec, socket transport and
//! target discovery.

pub mod codec;
pub mod discovery;
pub mod transport;

pub use codec::{Command, CommandResult, Event, Message, ResponseError, ScreencastFrame};
pub use discovery::{TargetInfo, wait_until_ready};
