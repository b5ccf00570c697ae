//! OCR oracle abstraction and the Tesseract command-line adapter.

use image::{GrayImage, ImageFormat};
use log::trace;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Recognition hints passed to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrOptions {
    /// Tesseract page segmentation mode; 7 treats the image as one text line.
    pub psm: u8,
    pub language: String,
    /// Characters the engine may emit. Empty means unrestricted.
    pub whitelist: String,
    /// Bias ambiguous glyphs towards digits.
    pub numeric_mode: bool,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            psm: 7,
            language: "eng".to_string(),
            whitelist: "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string(),
            numeric_mode: true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum OcrError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to encode OCR input: {0}")]
    Encode(#[from] image::ImageError),
    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Opaque text recognizer: image in, raw text out.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, image: &GrayImage, options: &OcrOptions) -> Result<String, OcrError>;
}

/// Runs the `tesseract` executable, feeding a PNG on stdin.
#[derive(Clone, Debug)]
pub struct TesseractCli {
    program: PathBuf,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Command-line arguments for one recognition call.
    pub fn args(options: &OcrOptions) -> Vec<String> {
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "--psm".to_string(),
            options.psm.to_string(),
            "-l".to_string(),
            options.language.clone(),
        ];
        if !options.whitelist.is_empty() {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", options.whitelist));
        }
        if options.numeric_mode {
            args.push("-c".to_string());
            args.push("classify_bln_numeric_mode=1".to_string());
        }
        args
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage, options: &OcrOptions) -> Result<String, OcrError> {
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let args = Self::args(options);
        trace!("running {} {}", self.program.display(), args.join(" "));
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| OcrError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // The pipe is closed when `stdin` drops; the child is reaped even if
        // it stopped reading early.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&png),
            None => Ok(()),
        };
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
