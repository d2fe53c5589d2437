//! Image normalization through ImageMagick's `convert`.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("convert exited with {status}: {stderr}")]
    ToolFailed { status: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("convert produced no output")]
    EmptyOutput,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Geometry {
    /// Shrink to at most this width, never enlarge.
    MaxWidth(u32),
    /// Fit into a square box.
    Square(u32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransformSpec {
    pub geometry: Geometry,
    /// JPEG quality; `None` keeps the tool's default.
    pub quality: Option<u8>,
    /// Strip metadata, use 4:2:0 chroma, sRGB and progressive encoding.
    pub web_optimized: bool,
}

impl TransformSpec {
    pub fn cover(max_width: u32, quality: u8) -> Self {
        Self {
            geometry: Geometry::MaxWidth(max_width),
            quality: Some(quality),
            web_optimized: true,
        }
    }

    pub fn artist_photo(size: u32) -> Self {
        Self {
            geometry: Geometry::Square(size),
            quality: None,
            web_optimized: false,
        }
    }

    /// Arguments placed between the input and output paths.
    pub fn convert_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.web_optimized {
            args.push("-strip".to_string());
        }
        if let Some(quality) = self.quality {
            args.push("-quality".to_string());
            args.push(quality.to_string());
        }
        args.push("-resize".to_string());
        args.push(match self.geometry {
            Geometry::MaxWidth(width) => format!("{}x>", width),
            Geometry::Square(size) => format!("{}x{}", size, size),
        });
        if self.web_optimized {
            args.extend(
                [
                    "-sampling-factor",
                    "4:2:0",
                    "-colorspace",
                    "sRGB",
                    "-interlace",
                    "Plane",
                ]
                .iter()
                .map(|s| s.to_string()),
            );
        }
        args
    }
}

#[async_trait]
pub trait ImageTransformer: Send + Sync {
    async fn transform(
        &self,
        input: &[u8],
        spec: &TransformSpec,
    ) -> Result<Vec<u8>, TransformError>;
}

/// Runs `convert <input> <args> <output>` on scratch files that are removed
/// once the call returns.
pub struct ConvertTransformer {
    binary: PathBuf,
}

impl ConvertTransformer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Checks that the configured binary can be launched.
    pub async fn check_available(&self) -> Result<(), TransformError> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if !output.status.success() {
            return Err(TransformError::ToolFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ImageTransformer for ConvertTransformer {
    async fn transform(
        &self,
        input: &[u8],
        spec: &TransformSpec,
    ) -> Result<Vec<u8>, TransformError> {
        let scratch = tempfile::tempdir()?;
        let input_path = scratch.path().join("input");
        let output_path = scratch.path().join("output.jpg");
        tokio::fs::write(&input_path, input).await?;

        let output = Command::new(&self.binary)
            .arg(&input_path)
            .args(spec.convert_args())
            .arg(&output_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(TransformError::ToolFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let bytes = match tokio::fs::read(&output_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransformError::EmptyOutput)
            }
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Err(TransformError::EmptyOutput);
        }
        Ok(bytes)
    }
}
