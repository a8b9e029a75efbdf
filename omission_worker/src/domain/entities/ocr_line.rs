use serde::{Deserialize, Serialize};

/// A single line recognized by the OCR engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrLine {
    /// `[x0, y0, x1, y1]` in pixels, when the engine reports layout.
    pub bounding_box: Option<[i32; 4]>,
    pub text: String,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f32,
}
