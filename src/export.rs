//! Scoped export handles.
//!
//! An [`ExportGuard`] owns one export handle and releases it exactly once:
//! either through [`ExportGuard::close`] or, if the guard goes out of scope
//! first, on drop. Failing cases therefore never leak handles.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SdkError;
use crate::flags::FlagSet;
use crate::sdk::{ExportHandle, ResolutionSdk};

/// Owns an open export handle for the lifetime of a test case.
#[derive(Debug)]
pub struct ExportGuard<'a, S: ResolutionSdk + ?Sized> {
    sdk: &'a S,
    handle: ExportHandle,
    closed: AtomicBool,
}

impl<'a, S: ResolutionSdk + ?Sized> ExportGuard<'a, S> {
    /// Starts a JSON entity export.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the export cannot be started.
    pub fn open(sdk: &'a S, flags: &FlagSet) -> Result<Self, SdkError> {
        let handle = sdk.export_json_entity_report(flags)?;
        tracing::debug!(%handle, %flags, "export opened");
        Ok(Self {
            sdk,
            handle,
            closed: AtomicBool::new(false),
        })
    }

    /// The underlying handle.
    #[must_use]
    pub const fn handle(&self) -> ExportHandle {
        self.handle
    }

    /// Fetches the next line of the export.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the fetch fails.
    pub fn fetch_next(&self) -> Result<Option<String>, SdkError> {
        self.sdk.fetch_next(self.handle)
    }

    /// Fetches every remaining non-blank line.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if any fetch fails.
    pub fn fetch_all(&self) -> Result<Vec<String>, SdkError> {
        let mut lines = Vec::new();
        while let Some(line) = self.fetch_next()? {
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    /// Closes the handle, surfacing any close failure.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the close fails. The guard will not
    /// attempt a second close on drop either way.
    pub fn close(self) -> Result<(), SdkError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.sdk.close_export(self.handle)
    }
}

impl<S: ResolutionSdk + ?Sized> Drop for ExportGuard<'_, S> {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            if let Err(err) = self.sdk.close_export(self.handle) {
                tracing::warn!(handle = %self.handle, error = %err, "failed to close export on drop");
            }
        }
    }
}
