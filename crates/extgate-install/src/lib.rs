//! Upload intake and the end-to-end install pipeline.
//!
//! - `intake.rs` - extension, content and signature checks, sandbox relocation
//! - `sniff.rs` - magic-byte MIME detection
//! - `config.rs` - `InstallerConfig`, loaded from TOML
//! - `pipeline.rs` - `Installer`: intake, normalize, extract

pub use config::{DEFAULT_MAX_UPLOAD_BYTES, InstallerConfig};
pub use error::{ConfigError, InstallError, IntakeError, Result};
pub use extgate_archive::ErrorKind;
pub use intake::{IntakeGuard, Sandboxed, Upload};
pub use pipeline::{InstallReport, Installer, Outcome};
pub use sniff::{ZIP_LOCAL_HEADER, ZIP_MIME, has_zip_signature, sniff_mime};

mod config;
mod error;
mod intake;
mod pipeline;
mod sniff;
