//! Filesystem primitives for installing extensions.
//!
//! - `cleanup.rs` - post-order, best-effort recursive delete
//! - `owned_dir.rs` - randomly named staging/scratch directories
//! - `promote.rs` - atomic rename into the install root
//! - `contain.rs` - real-path containment checks
//! - `permissions.rs` - mode bits for installed files and directories

mod cleanup;
mod contain;
mod error;
mod owned_dir;
mod permissions;
mod promote;
mod random;

pub use cleanup::{CleanupReport, remove_tree};
pub use contain::{create_dir_chain, ensure_within};
pub use error::{Error, Result};
pub use owned_dir::{OwnedDir, cleanup_logged};
pub use permissions::PermissionMode;
pub use promote::promote_dir;
pub use random::random_hex;
