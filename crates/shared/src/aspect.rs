use serde::{Deserialize, Serialize};

use crate::error::EditError;

/// Edit service constraint: ratios narrower than 3:7 or wider than 7:3
/// are rejected before any network traffic happens.
pub const MIN_SUPPORTED_RATIO: f64 = 3.0 / 7.0;
pub const MAX_SUPPORTED_RATIO: f64 = 7.0 / 3.0;

/// Ratio labels the edit service accepts on the wire, in preference
/// order for tie-breaking.
const SUPPORTED_RATIO_LABELS: [(&str, u32, u32); 11] = [
    ("1:1", 1, 1),
    ("4:3", 4, 3),
    ("3:4", 3, 4),
    ("16:9", 16, 9),
    ("9:16", 9, 16),
    ("21:9", 21, 9),
    ("9:21", 9, 21),
    ("3:2", 3, 2),
    ("2:3", 2, 3),
    ("7:3", 7, 3),
    ("3:7", 3, 7),
];

/// Normalized aspect ratio of a source image, computed once when the
/// image is received and forwarded verbatim with the edit job so that
/// the backend preserves the original framing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
    pub ratio: f64,
}

impl AspectRatio {
    pub fn new(width: u32, height: u32) -> Result<Self, EditError> {
        if width == 0 || height == 0 {
            return Err(EditError::InvalidImage);
        }
        Ok(Self {
            width,
            height,
            ratio: f64::from(width) / f64::from(height),
        })
    }

    /// Whether the ratio falls inside the service's accepted range.
    pub fn supported(&self) -> bool {
        (MIN_SUPPORTED_RATIO..=MAX_SUPPORTED_RATIO).contains(&self.ratio)
    }

    /// Nearest wire label from the service's supported set.
    pub fn closest_label(&self) -> &'static str {
        let mut best = SUPPORTED_RATIO_LABELS[0].0;
        let mut best_diff = f64::INFINITY;
        for (label, w, h) in SUPPORTED_RATIO_LABELS {
            let diff = (self.ratio - f64::from(w) / f64::from(h)).abs();
            if diff < best_diff {
                best_diff = diff;
                best = label;
            }
        }
        best
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} ({})", self.width, self.height, self.closest_label())
    }
}
