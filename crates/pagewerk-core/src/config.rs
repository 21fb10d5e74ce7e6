// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PagewerkError, Result};
use crate::types::{Orientation, PageSetup, PaperSize, RasterSettings};

/// Size ceilings enforced by the intake layer before bytes reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeLimits {
    /// Largest accepted file, in bytes (default 50 MiB).
    pub max_file_bytes: u64,
    /// Most files accepted in one batch (default 10).
    pub max_batch_files: usize,
}

impl IntakeLimits {
    /// Reject a single file that exceeds the size ceiling or is empty.
    pub fn check_file(&self, name: &str, len: u64) -> Result<()> {
        if len == 0 {
            return Err(PagewerkError::Intake {
                file: name.to_owned(),
                reason: "file is empty".into(),
            });
        }
        if len > self.max_file_bytes {
            return Err(PagewerkError::Intake {
                file: name.to_owned(),
                reason: format!(
                    "file is {} bytes, limit is {} bytes",
                    len, self.max_file_bytes
                ),
            });
        }
        Ok(())
    }

    /// Reject a batch with more files than allowed.
    pub fn check_batch(&self, count: usize) -> Result<()> {
        if count > self.max_batch_files {
            return Err(PagewerkError::Intake {
                file: format!("{count} files"),
                reason: format!("at most {} files per batch", self.max_batch_files),
            });
        }
        Ok(())
    }
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 50 * 1024 * 1024,
            max_batch_files: 10,
        }
    }
}

/// Engine settings. Every field has a default, so a config file only needs
/// the keys it wants to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Paper size for image-to-document conversion.
    pub default_paper_size: PaperSize,
    pub default_orientation: Orientation,
    /// Margin on each side, in millimetres.
    pub default_margin_mm: f32,
    /// Format, DPI and quality for rasterization.
    pub default_raster: RasterSettings,
    /// PDF header version written into generated documents.
    pub pdf_version: String,
    /// Flate-compress streams of generated documents.
    pub compress_output: bool,
    /// Run page/image work units on the rayon pool.
    pub parallel: bool,
    pub intake: IntakeLimits,
    /// How long the job-tracking layer keeps results (default 30 minutes).
    pub result_retention_secs: u64,
}

impl EngineConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Default page setup built from the paper/orientation/margin fields.
    pub fn page_setup(&self) -> PageSetup {
        PageSetup {
            paper_size: self.default_paper_size,
            orientation: self.default_orientation,
            margin_mm: self.default_margin_mm,
        }
    }

    /// How long results are kept. Values past what `chrono` can hold
    /// saturate.
    pub fn result_retention(&self) -> chrono::Duration {
        i64::try_from(self.result_retention_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_paper_size: PaperSize::A4,
            default_orientation: Orientation::Portrait,
            default_margin_mm: 10.0,
            default_raster: RasterSettings::default(),
            pdf_version: "1.7".into(),
            compress_output: true,
            parallel: true,
            intake: IntakeLimits::default(),
            result_retention_secs: 30 * 60,
        }
    }
}
