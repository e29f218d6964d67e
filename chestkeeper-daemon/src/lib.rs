//! Chestkeeper retention daemon: scanner, disposal strategies, sweep policy,
//! run loop, and the Unix-socket control protocol.

mod daemon;
pub mod disposer;
mod error;
pub mod paths;
pub mod policy;
pub mod protocol;
mod runtime;
pub mod scanner;

pub use daemon::{DaemonControl, DaemonHandle, DaemonState, RetentionDaemon};
pub use disposer::{DeleteStrategy, Disposer, MoveStrategy, Operation};
pub use error::DaemonError;
pub use policy::{DisposalFailure, SweepEngine, SweepKind, SweepReport, Watermarks};
pub use protocol::{
    request_cleanup, request_status, request_stop, send_request, DaemonReply, DaemonRequest,
    DaemonStatus,
};
pub use runtime::{run, start_blocking};
pub use scanner::Scanner;
