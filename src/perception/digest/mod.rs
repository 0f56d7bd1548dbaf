use crate::config::PerceptionConfig;
use crate::utils::truncate_chars;
use sha2::{Digest, Sha256};

/// Text pulled out of one captured frame by the OCR/accessibility layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Free text recognized on screen.
    pub text_spans: Vec<String>,
    /// Labels of interactive UI elements (buttons, fields, menu items).
    pub element_spans: Vec<String>,
}

impl Frame {
    pub fn new(text_spans: Vec<String>, element_spans: Vec<String>) -> Self {
        Self {
            text_spans,
            element_spans,
        }
    }
}

/// Bounds on how much of a frame contributes to its digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestLimits {
    pub max_text_spans: usize,
    pub max_element_spans: usize,
    pub max_span_chars: usize,
}

impl From<&PerceptionConfig> for DigestLimits {
    fn from(config: &PerceptionConfig) -> Self {
        Self {
            max_text_spans: config.max_text_spans,
            max_element_spans: config.max_element_spans,
            max_span_chars: config.max_span_chars,
        }
    }
}

impl Default for DigestLimits {
    fn default() -> Self {
        Self::from(&PerceptionConfig::default())
    }
}

/// SHA-256 over the normalized text of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PerceptionDigest([u8; 32]);

impl std::fmt::Display for PerceptionDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

const SPAN_SEPARATOR: &str = "\u{1f}";
const SECTION_SEPARATOR: &str = "\u{1e}";

fn normalized_spans(spans: &[String], max_spans: usize, max_chars: usize) -> Vec<String> {
    spans
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .take(max_spans)
        .map(|s| truncate_chars(s, max_chars).to_lowercase())
        .collect()
}

/// Digest a frame so benign case and whitespace differences hash the same.
///
/// Spans are trimmed and lowercased, blanks dropped, each span truncated to
/// `max_span_chars`, and at most `max_text_spans`/`max_element_spans` spans
/// of each kind are considered.
pub fn compute_digest(frame: &Frame, limits: &DigestLimits) -> PerceptionDigest {
    let text = normalized_spans(
        &frame.text_spans,
        limits.max_text_spans,
        limits.max_span_chars,
    );
    let elements = normalized_spans(
        &frame.element_spans,
        limits.max_element_spans,
        limits.max_span_chars,
    );

    let mut hasher = Sha256::new();
    hasher.update(text.join(SPAN_SEPARATOR).as_bytes());
    hasher.update(SECTION_SEPARATOR.as_bytes());
    hasher.update(elements.join(SPAN_SEPARATOR).as_bytes());
    PerceptionDigest(hasher.finalize().into())
}
