use crate::types::SentimentClass;

/// A numeric sentiment model. Implementations may return any value, [SentimentScorer]
/// takes care of bringing it into [-1, 1].
pub trait SentimentModel: Send + 'static {
    /// Raw polarity of the text
    fn polarity(&self, text: &str) -> f64;
}

impl<F> SentimentModel for F
where
    F: Fn(&str) -> f64 + Send + 'static,
{
    fn polarity(&self, text: &str) -> f64 {
        self(text)
    }
}

/// Polarity of a text and its class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Polarity in [-1, 1]
    pub polarity: f64,
    /// Class derived from the polarity sign
    pub class: SentimentClass,
}

/// Applies a [SentimentModel] and classifies its output.
///
/// Every aggregate in this crate classifies through [SentimentClass::from_polarity] on the
/// clamped value, so two snapshots built with the same model are reproducible.
#[derive(Debug, Clone)]
pub struct SentimentScorer<M> {
    model: M,
}

impl<M: SentimentModel> SentimentScorer<M> {
    /// Create a scorer for the given model
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Score a text
    pub fn score(&self, text: &str) -> Score {
        let raw = self.model.polarity(text);
        let polarity = if raw.is_nan() {
            0.0
        } else {
            raw.clamp(-1.0, 1.0)
        };
        Score {
            polarity,
            class: SentimentClass::from_polarity(polarity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_model_output() {
        let scorer = SentimentScorer::new(|_: &str| 3.5);
        let score = scorer.score("whatever");
        assert_eq!(score.polarity, 1.0);
        assert_eq!(score.class, SentimentClass::Positive);

        let scorer = SentimentScorer::new(|_: &str| -12.0);
        assert_eq!(scorer.score("x").polarity, -1.0);
    }

    #[test]
    fn nan_is_neutral() {
        let scorer = SentimentScorer::new(|_: &str| f64::NAN);
        let score = scorer.score("x");
        assert_eq!(score.polarity, 0.0);
        assert_eq!(score.class, SentimentClass::Neutral);
    }

    #[test]
    fn boxed_closure_model() {
        let boxed: Box<dyn Fn(&str) -> f64 + Send> = Box::new(|_: &str| -0.25);
        assert_eq!(
            SentimentScorer::new(boxed).score("x").class,
            SentimentClass::Negative
        );
    }
}
