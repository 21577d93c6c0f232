//! Tesseract command line engine.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use imgdex_core::{OcrEngine, RecognizeError};
use std::io::Cursor;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// OCR engine backed by the `tesseract` executable.
///
/// Each call encodes the image as PNG, pipes it to
/// `tesseract stdin stdout -l <language>` and reads the text back. The
/// trailing page break is trimmed; breaks between pages become newlines.
pub struct TesseractEngine {
    command: String,
    language: String,
}

impl TesseractEngine {
    /// Create an engine running `command` with the given language pack.
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }

    /// Executable invoked for each image.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn language(&self) -> &str {
        &self.language
    }

    async fn init(&self) -> Result<(), RecognizeError> {
        let output = Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RecognizeError::Engine(format!("cannot run {}: {e}", self.command)))?;

        if !output.status.success() {
            return Err(RecognizeError::Engine(format!(
                "{} --version exited with {}",
                self.command, output.status
            )));
        }

        // tesseract 4 prints its version on stderr, 5 on stdout
        let banner = if output.stdout.is_empty() {
            &output.stderr
        } else {
            &output.stdout
        };
        let version = String::from_utf8_lossy(banner);
        info!(
            "OCR engine ready: {} (language {})",
            version.lines().next().unwrap_or("tesseract").trim(),
            self.language
        );
        Ok(())
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<String, RecognizeError> {
        let image = image.clone();
        let png = tokio::task::spawn_blocking(move || encode_png(&image))
            .await
            .map_err(|e| RecognizeError::Join(e.to_string()))??;

        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RecognizeError::Engine(format!("cannot run {}: {e}", self.command)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RecognizeError::Engine("stdin not captured".to_string()))?;
        let writer = tokio::spawn(async move {
            stdin.write_all(&png).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await?;
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Writing image to {} failed: {}", self.command, e),
            Err(e) => return Err(RecognizeError::Join(e.to_string())),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognizeError::Engine(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(clean_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Trim trailing whitespace (including the final form feed) and turn the
/// form feeds separating pages into newlines.
fn clean_output(raw: &str) -> String {
    raw.trim_end().replace('\x0c', "\n")
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, RecognizeError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| RecognizeError::Decode(format!("cannot encode image: {e}")))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn blank_image() -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(8, 8, Rgb([255u8, 255, 255])))
    }

    #[test]
    fn test_engine_metadata() {
        let engine = TesseractEngine::new("tesseract", "ita");
        assert_eq!(engine.name(), "tesseract");
        assert_eq!(engine.language(), "ita");
        assert_eq!(engine.command(), "tesseract");
    }

    #[test]
    fn test_encode_png_roundtrips_dimensions() {
        let png = encode_png(&blank_image()).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 8);
    }

    #[test]
    fn test_clean_output_keeps_page_boundaries() {
        assert_eq!(clean_output("FATTURA 42\n\x0c"), "FATTURA 42");
        assert_eq!(
            clean_output("pagina uno\n\x0cpagina due\n\x0c"),
            "pagina uno\n\npagina due"
        );
        assert_eq!(clean_output("\x0c"), "");
    }

    #[tokio::test]
    async fn test_init_fails_for_missing_command() {
        let engine = TesseractEngine::new("imgdex-no-such-ocr-binary", "eng");
        let result = engine.init().await;
        assert!(matches!(result, Err(RecognizeError::Engine(_))));
    }

    #[tokio::test]
    async fn test_recognize_fails_for_missing_command() {
        let engine = TesseractEngine::new("imgdex-no-such-ocr-binary", "eng");
        let result = engine.recognize(&blank_image()).await;
        assert!(matches!(result, Err(RecognizeError::Engine(_))));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;
        use tempfile::tempdir;

        fn write_script(dir: &Path, body: &str) -> String {
            let path = dir.join("fake-tesseract");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        #[tokio::test]
        async fn test_recognize_strips_form_feed() {
            let dir = tempdir().unwrap();
            let script = write_script(dir.path(), "cat > /dev/null\nprintf 'FATTURA 42\\n\\f'");
            let engine = TesseractEngine::new(script, "ita");

            let text = engine.recognize(&blank_image()).await.unwrap();
            assert_eq!(text, "FATTURA 42");
        }

        #[tokio::test]
        async fn test_recognize_separates_pages() {
            let dir = tempdir().unwrap();
            let script = write_script(dir.path(), "cat > /dev/null\nprintf 'uno\\n\\fdue\\n\\f'");
            let engine = TesseractEngine::new(script, "ita");

            let text = engine.recognize(&blank_image()).await.unwrap();
            assert_eq!(text, "uno\n\ndue");
        }

        #[tokio::test]
        async fn test_recognize_reports_engine_failure() {
            let dir = tempdir().unwrap();
            let script = write_script(dir.path(), "cat > /dev/null\necho 'bad language' >&2\nexit 1");
            let engine = TesseractEngine::new(script, "xxx");

            let err = engine.recognize(&blank_image()).await.unwrap_err();
            assert!(err.to_string().contains("bad language"));
        }

        #[tokio::test]
        async fn test_init_accepts_version_banner() {
            let dir = tempdir().unwrap();
            let script = write_script(dir.path(), "echo 'tesseract 5.3.0'");
            let engine = TesseractEngine::new(script, "ita");
            engine.init().await.unwrap();
        }
    }
}
