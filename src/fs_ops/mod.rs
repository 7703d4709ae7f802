//! Filesystem primitives used by the merge engine.

pub mod atomic;
pub mod helpers;
pub mod io_copy;
pub mod lock;
pub mod metadata;
pub mod staging;
pub mod xattrs;

pub use atomic::try_atomic_move;
pub use helpers::io_error_with_help;
pub use lock::{RunLock, acquire_run_lock};
pub use staging::{is_cross_device, is_staging_name, sweep_stale};
pub use xattrs::XattrSet;
