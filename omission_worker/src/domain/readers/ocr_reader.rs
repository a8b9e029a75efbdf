use std::path::Path;

use common::helper::error_chain_fmt;

use crate::domain::entities::ocr_line::OcrLine;

#[derive(thiserror::Error)]
pub enum OcrReaderError {
    #[error("OCR engine error: {0}")]
    EngineError(String),

    #[error("OCR support is not compiled in. Rebuild with `--features ocr`")]
    FeatureNotEnabled,
}

impl std::fmt::Debug for OcrReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Recognizes the text lines of an image document with Tesseract.
///
/// Tesseract reports one confidence for the whole recognition, not one per
/// line; every returned line carries that mean confidence and no bounding
/// box.
#[cfg(feature = "ocr")]
pub fn read_image_lines(path: &Path) -> Result<Vec<OcrLine>, OcrReaderError> {
    use leptess::LepTess;

    let mut engine = LepTess::new(None, "eng")
        .map_err(|error| OcrReaderError::EngineError(error.to_string()))?;
    engine
        .set_image(path)
        .map_err(|error| OcrReaderError::EngineError(error.to_string()))?;

    let text = engine
        .get_utf8_text()
        .map_err(|error| OcrReaderError::EngineError(error.to_string()))?;
    let confidence = engine.mean_text_conf() as f32 / 100.0;

    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| OcrLine {
            bounding_box: None,
            text: line.trim().to_string(),
            confidence,
        })
        .collect())
}

/// Fallback when the ocr feature is not enabled
#[cfg(not(feature = "ocr"))]
pub fn read_image_lines(_path: &Path) -> Result<Vec<OcrLine>, OcrReaderError> {
    Err(OcrReaderError::FeatureNotEnabled)
}
