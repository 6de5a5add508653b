/// Split text into lowercase alphanumeric tokens.
///
/// Any character which is not alphanumeric separates tokens, so `"it's fine"` yields
/// `["it", "s", "fine"]`. Empty fragments are discarded.
///
/// ```
/// use revstream::text::tokenize;
///
/// assert_eq!(tokenize("Great product!!"), vec!["great", "product"]);
/// assert!(tokenize("  ...  ").is_empty());
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    Tokenizer::default().tokenize(text)
}

/// Configurable tokenizer. The default configuration is equivalent to [tokenize].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tokenizer {
    alphabetic_only: bool,
}

impl Tokenizer {
    /// Drop tokens containing digits, e.g. `"2"` or `"4k"`
    pub fn alphabetic_only(mut self, alphabetic_only: bool) -> Self {
        self.alphabetic_only = alphabetic_only;
        self
    }

    /// Tokenize the text. Never fails, empty text gives an empty vec.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|fragment| !fragment.is_empty())
            .map(normalize)
            .filter(|token| !token.is_empty())
            .filter(|token| !self.alphabetic_only || token.chars().all(char::is_alphabetic))
            .collect()
    }
}

/// Lowercasing may expand a character into several, some of which (combining marks) are not
/// alphanumeric. These get stripped.
fn normalize(fragment: &str) -> String {
    fragment
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_on_punctuation() {
        assert_eq!(tokenize("it's fine"), vec!["it", "s", "fine"]);
        assert_eq!(
            tokenize("Battery-life: TERRIBLE, 2/10"),
            vec!["battery", "life", "terrible", "2", "10"]
        );
    }

    #[test]
    fn empty_and_whitespace() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \t\n ").is_empty());
        assert!(tokenize("?!... --").is_empty());
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(tokenize("Très BIEN"), vec!["très", "bien"]);
    }

    #[test]
    fn alphabetic_only_drops_numbers() {
        let tokenizer = Tokenizer::default().alphabetic_only(true);
        assert_eq!(tokenizer.tokenize("Bought 2 in 2019, 4k screen"), vec!["bought", "in", "screen"]);
    }

    proptest! {
        #[test]
        fn tokens_are_lowercase_alphanumeric(text in "[a-zA-Z0-9 .,!?'_\\-éÉ\t\n]{0,64}") {
            for token in tokenize(&text) {
                prop_assert!(!token.is_empty());
                prop_assert!(token.chars().all(char::is_alphanumeric));
                prop_assert_eq!(token.to_lowercase(), token.clone());
            }
        }

        #[test]
        fn whitespace_yields_nothing(text in "[ \t\n\r]{0,32}") {
            prop_assert!(tokenize(&text).is_empty());
        }
    }
}
