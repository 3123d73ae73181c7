use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;

/// Anything that turns an image file into text.
pub trait TextRecognizer {
    fn recognize(&self, image: &Path) -> Result<String>;
}

/// The `tesseract` command-line engine.
pub struct Tesseract {
    binary: String,
    psm: Option<u8>,
}

impl Tesseract {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            psm: None,
        }
    }

    /// Page segmentation mode (`--psm`); 6 treats the input as one block of text.
    pub fn with_psm(mut self, psm: u8) -> Self {
        self.psm = Some(psm);
        self
    }
}

impl TextRecognizer for Tesseract {
    fn recognize(&self, image: &Path) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command.arg(image).arg("stdout");
        if let Some(psm) = self.psm {
            command.arg("--psm").arg(psm.to_string());
        }

        let output = command
            .output()
            .with_context(|| format!("failed to run {} (is tesseract installed?)", self.binary))?;

        if !output.status.success() {
            bail!(
                "tesseract failed on {}: {}",
                image.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
