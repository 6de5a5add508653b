//! A small lexical sentiment model for product reviews.
//!
//! The polarity of a text is the mean of the polarities of all lexicon words found in it.
//! An intensifier directly before a word scales it, a negation within the three preceding
//! tokens flips it with a damping of 0.5.
use std::collections::HashMap;

use super::{tokenize, SentimentModel};

const NEGATION_WINDOW: usize = 3;
const NEGATION_DAMPING: f64 = -0.5;

const POSITIVE: &[(&str, f64)] = &[
    ("amazing", 0.6),
    ("awesome", 1.0),
    ("beautiful", 0.85),
    ("best", 1.0),
    ("better", 0.5),
    ("cheap", 0.4),
    ("comfortable", 0.4),
    ("easy", 0.43),
    ("excellent", 1.0),
    ("fantastic", 0.4),
    ("fast", 0.2),
    ("fine", 0.42),
    ("fun", 0.3),
    ("good", 0.7),
    ("great", 0.8),
    ("happy", 0.8),
    ("helpful", 0.5),
    ("love", 0.5),
    ("loved", 0.7),
    ("loves", 0.5),
    ("nice", 0.6),
    ("perfect", 1.0),
    ("recommend", 0.4),
    ("reliable", 0.5),
    ("satisfied", 0.5),
    ("simple", 0.2),
    ("solid", 0.3),
    ("sturdy", 0.4),
    ("useful", 0.3),
    ("well", 0.3),
    ("wonderful", 1.0),
    ("works", 0.2),
];

const NEGATIVE: &[(&str, f64)] = &[
    ("awful", -1.0),
    ("bad", -0.7),
    ("broke", -0.6),
    ("broken", -0.4),
    ("cheaply", -0.3),
    ("defective", -0.7),
    ("difficult", -0.5),
    ("disappointed", -0.75),
    ("disappointing", -0.6),
    ("expensive", -0.5),
    ("fail", -0.5),
    ("failed", -0.5),
    ("flimsy", -0.5),
    ("hard", -0.29),
    ("hate", -0.8),
    ("horrible", -1.0),
    ("junk", -0.6),
    ("poor", -0.4),
    ("problem", -0.4),
    ("return", -0.2),
    ("returned", -0.3),
    ("slow", -0.3),
    ("terrible", -1.0),
    ("useless", -0.5),
    ("waste", -0.6),
    ("worse", -0.4),
    ("worst", -1.0),
    ("wrong", -0.5),
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("absolutely", 1.6),
    ("extremely", 1.8),
    ("highly", 1.4),
    ("incredibly", 1.7),
    ("really", 1.4),
    ("slightly", 0.7),
    ("somewhat", 0.8),
    ("super", 1.5),
    ("very", 1.3),
];

const NEGATIONS: &[&str] = &[
    "no", "not", "never", "nothing", "neither", "nor", "dont", "doesnt", "didnt", "isnt", "wasnt",
    "cant", "cannot", "wont", "wouldnt", "shouldnt", "hardly",
];

/// Lexicon based [SentimentModel]
#[derive(Debug, Clone)]
pub struct LexiconModel {
    words: HashMap<String, f64>,
    intensifiers: HashMap<String, f64>,
    negations: Vec<String>,
}

impl Default for LexiconModel {
    fn default() -> Self {
        Self {
            words: POSITIVE
                .iter()
                .chain(NEGATIVE)
                .map(|(w, s)| ((*w).to_owned(), *s))
                .collect(),
            intensifiers: INTENSIFIERS
                .iter()
                .map(|(w, s)| ((*w).to_owned(), *s))
                .collect(),
            negations: NEGATIONS.iter().map(|w| (*w).to_owned()).collect(),
        }
    }
}

impl LexiconModel {
    /// Add or override a word. The polarity is clamped to [-1, 1].
    pub fn with_word(mut self, word: &str, polarity: f64) -> Self {
        self.words
            .insert(word.to_lowercase(), polarity.clamp(-1.0, 1.0));
        self
    }

    fn is_negation(&self, token: &str) -> bool {
        self.negations.iter().any(|n| n == token)
    }
}

impl SentimentModel for LexiconModel {
    fn polarity(&self, text: &str) -> f64 {
        // "don't" tokenizes to "don", "t"; glue these back so negations are found
        let tokens = tokenize(text);
        let mut sum = 0.0;
        let mut hits = 0usize;
        let mut modifier = 1.0;
        let mut since_negation: Option<usize> = None;
        let mut prev: Option<&str> = None;

        for token in tokens.iter().map(String::as_str) {
            let glued = match (prev, token) {
                (Some(p), "t") => Some(format!("{p}t")),
                _ => None,
            };
            prev = Some(token);
            if self.is_negation(token) || glued.is_some_and(|g| self.is_negation(&g)) {
                since_negation = Some(0);
                continue;
            }
            if let Some(m) = self.intensifiers.get(token) {
                modifier = *m;
                continue;
            }
            if let Some(base) = self.words.get(token) {
                let mut score = base * modifier;
                if since_negation.is_some_and(|n| n < NEGATION_WINDOW) {
                    score *= NEGATION_DAMPING;
                }
                sum += score;
                hits += 1;
                modifier = 1.0;
            }
            since_negation = since_negation.map(|n| n + 1);
        }

        if hits == 0 {
            0.0
        } else {
            (sum / hits as f64).clamp(-1.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_without_known_words() {
        let model = LexiconModel::default();
        assert_eq!(model.polarity("the box arrived on tuesday"), 0.0);
        assert_eq!(model.polarity(""), 0.0);
    }

    #[test]
    fn polarity_sign() {
        let model = LexiconModel::default();
        assert!(model.polarity("great product") > 0.0);
        assert!(model.polarity("terrible battery") < 0.0);
    }

    #[test]
    fn negation_flips() {
        let model = LexiconModel::default();
        assert!(model.polarity("not good") < 0.0);
        assert!(model.polarity("this is not a bad charger") > 0.0);
        assert!(model.polarity("awful, do not buy") < 0.0);
    }

    #[test]
    fn apostrophe_negation() {
        let model = LexiconModel::default();
        assert!(model.polarity("It doesn't work well") < 0.0);
    }

    #[test]
    fn intensifier_scales() {
        let model = LexiconModel::default();
        assert!(model.polarity("very good") > model.polarity("good"));
        assert!(model.polarity("slightly good") < model.polarity("good"));
    }

    #[test]
    fn custom_words() {
        let model = LexiconModel::default().with_word("Meh", -5.0);
        assert_eq!(model.polarity("meh"), -1.0);
    }
}
