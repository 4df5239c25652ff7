//! simplesync daemon runtime: change feed + change reactor + lifecycle.

mod error;
pub mod feed;
pub mod logging;
pub mod reactor;
mod runtime;

pub use error::DaemonError;
pub use feed::{ChangeEvent, ChangeFeed, ChangeKind};
pub use logging::{init_tracing, LogFormat};
pub use reactor::{ChangeReactor, PassStats};
pub use runtime::{
    run, run_once, run_until, start_blocking, LifecycleState, RunMode, RunReport, ShutdownSignal,
};
