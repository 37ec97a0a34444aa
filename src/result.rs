//! Result type for the command layer and binary entry point.
//!
//! Library modules return [`crate::error::Result`] so callers can match on
//! [`crate::error::ReleaseError`]. Commands convert into this `color-eyre`
//! backed alias, attaching the name of the step that failed with
//! `.wrap_err_with()`, which gives colorized reports with the typed error
//! preserved underneath for `downcast_ref`.
//!
//! ```rust,ignore
//! use color_eyre::eyre::WrapErr;
//! use crate::result::Result;
//!
//! fn run() -> Result<()> {
//!     orchestrator.validate().wrap_err("validate step failed")?;
//!     Ok(())
//! }
//! ```

use color_eyre::eyre::Result as EyreResult;

/// Standard result type used by commands and `main`.
pub type Result<T> = EyreResult<T>;
