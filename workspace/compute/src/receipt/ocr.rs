use async_trait::async_trait;
use image::{GrayImage, ImageFormat};
use std::io::ErrorKind;
use std::process::Command;
use tracing::{debug, instrument, warn};

use super::ReceiptError;

/// Recognized text with the engine's mean word confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    pub confidence: f64,
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &GrayImage) -> Result<OcrOutput, ReceiptError>;
}

/// Runs the `tesseract` binary on a temporary PNG and reads its TSV output.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    pub command: String,
    /// Page segmentation mode; 6 treats the image as one block of text.
    pub psm: u8,
    pub language: Option<String>,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            psm: 6,
            language: None,
        }
    }
}

impl TesseractCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Whether the binary can be started at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run(&self, image: &GrayImage) -> Result<String, ReceiptError> {
        let file = tempfile::Builder::new()
            .prefix("receipt-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| ReceiptError::OcrFailed(format!("temporary file: {e}")))?;
        image
            .save_with_format(file.path(), ImageFormat::Png)
            .map_err(|e| ReceiptError::OcrFailed(format!("could not write image: {e}")))?;

        let mut command = Command::new(&self.command);
        command.arg(file.path()).arg("stdout").arg("--psm").arg(self.psm.to_string());
        if let Some(language) = &self.language {
            command.arg("-l").arg(language);
        }
        command.arg("tsv");

        let output = command.output().map_err(|e| match e.kind() {
            ErrorKind::NotFound => ReceiptError::OcrUnavailable(format!("`{}` not found", self.command)),
            _ => ReceiptError::OcrUnavailable(e.to_string()),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = ?output.status, "tesseract exited with an error");
            return Err(ReceiptError::OcrFailed(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    async fn recognize(&self, image: &GrayImage) -> Result<OcrOutput, ReceiptError> {
        let engine = self.clone();
        let image = image.clone();
        let tsv = tokio::task::spawn_blocking(move || engine.run(&image))
            .await
            .map_err(|e| ReceiptError::OcrFailed(format!("OCR task aborted: {e}")))??;

        let output = parse_tsv(&tsv);
        debug!(
            "OCR produced {} characters at confidence {:.2}",
            output.text.len(),
            output.confidence
        );
        Ok(output)
    }
}

/// Rebuilds the text line by line from tesseract's TSV and averages the
/// confidence of the recognized words. Rows with confidence `-1` are layout
/// rows, not words.
pub fn parse_tsv(tsv: &str) -> OcrOutput {
    let mut lines: Vec<String> = Vec::new();
    let mut current_line: Option<(&str, &str, &str, &str)> = None;
    let mut confidences = Vec::new();

    for row in tsv.lines().skip(1) {
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 12 {
            continue;
        }
        let Ok(confidence) = columns[10].trim().parse::<f64>() else {
            continue;
        };
        let word = columns[11].trim();
        if confidence < 0.0 || word.is_empty() {
            continue;
        }

        let line_key = (columns[1], columns[2], columns[3], columns[4]);
        match lines.last_mut() {
            Some(line) if current_line == Some(line_key) => {
                line.push(' ');
                line.push_str(word);
            }
            _ => {
                lines.push(word.to_string());
                current_line = Some(line_key);
            }
        }
        confidences.push(confidence.clamp(0.0, 100.0) / 100.0);
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };

    OcrOutput {
        text: lines.join("\n"),
        confidence,
    }
}
