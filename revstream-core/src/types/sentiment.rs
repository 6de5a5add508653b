use serde::{Deserialize, Serialize};

/// Sentiment class derived from a polarity score by a strict sign test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentClass {
    /// polarity > 0
    Positive,
    /// polarity == 0
    Neutral,
    /// polarity < 0
    Negative,
}

impl SentimentClass {
    /// Classify a polarity. Zero (and NaN) is neutral.
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > 0.0 {
            SentimentClass::Positive
        } else if polarity < 0.0 {
            SentimentClass::Negative
        } else {
            SentimentClass::Neutral
        }
    }
}
