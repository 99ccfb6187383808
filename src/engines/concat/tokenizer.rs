use super::syllabifier::is_apostrophe;

/// Strength of a pause introduced by punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseKind {
    /// `, ; : — – ( ) [ ] { }`
    Clause,
    /// `. ! ? …` and line breaks
    Sentence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Lowercased word, apostrophes kept as written.
    Word(String),
    Pause(PauseKind),
}

/// Split text into words and punctuation pauses.
///
/// Words are delimited by whitespace, hyphens, quote marks and symbols such
/// as `/ * &`. Characters that are neither separators nor punctuation stay
/// inside the word, so unsupported input surfaces later as a syllabification
/// error instead of being dropped here.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        let ch_len = ch.len_utf8();
        if let Some(kind) = map_boundary_punctuation(ch) {
            if !is_numeric_connector_between_digits(text, idx, ch_len, ch) {
                flush_word(&mut tokens, &mut current);
                tokens.push(Token::Pause(kind));
                continue;
            }
        }

        if ch.is_whitespace() || is_word_separator(ch) {
            flush_word(&mut tokens, &mut current);
            continue;
        }

        current.extend(ch.to_lowercase());
    }

    flush_word(&mut tokens, &mut current);
    tokens
}

fn flush_word(tokens: &mut Vec<Token>, current: &mut String) {
    // An apostrophe at a word edge is a quote, not a marker.
    let trimmed = current.trim_matches(is_apostrophe);
    if !trimmed.is_empty() {
        tokens.push(Token::Word(trimmed.to_string()));
    }
    current.clear();
}

fn map_boundary_punctuation(ch: char) -> Option<PauseKind> {
    match ch {
        '.' | '!' | '?' | '…' | '\n' | '\r' => Some(PauseKind::Sentence),
        ',' | ';' | ':' | '—' | '–' | '(' | ')' | '[' | ']' | '{' | '}' => {
            Some(PauseKind::Clause)
        }
        _ => None,
    }
}

fn is_word_separator(ch: char) -> bool {
    matches!(
        ch,
        '-' | '\u{2010}'
            | '\u{2011}'
            | '"'
            | '«'
            | '»'
            | '„'
            | '\u{201C}'
            | '\u{201D}'
            | '/'
            | '\\'
            | '|'
            | '*'
            | '&'
            | '+'
            | '='
            | '<'
            | '>'
            | '#'
            | '@'
            | '~'
            | '^'
            | '_'
            | '%'
            | '$'
    )
}

fn is_numeric_connector_between_digits(text: &str, idx: usize, ch_len: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }

    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch_len..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn splits_words_and_punctuation() {
        assert_eq!(
            tokenize("Добрий день, друже. Як справи?"),
            vec![
                word("добрий"),
                word("день"),
                Token::Pause(PauseKind::Clause),
                word("друже"),
                Token::Pause(PauseKind::Sentence),
                word("як"),
                word("справи"),
                Token::Pause(PauseKind::Sentence),
            ]
        );
    }

    #[test]
    fn hyphens_and_quotes_separate_words() {
        assert_eq!(
            tokenize("він-таки «сказав»"),
            vec![word("він"), word("таки"), word("сказав")]
        );
    }

    #[test]
    fn keeps_inner_apostrophe_drops_edge_quotes() {
        assert_eq!(tokenize("'п'ять'"), vec![word("п'ять")]);
        assert_eq!(tokenize("м\u{2019}ята"), vec![word("м\u{2019}ята")]);
    }

    #[test]
    fn brackets_pause_and_symbols_separate() {
        assert_eq!(
            tokenize("так [ні]"),
            vec![
                word("так"),
                Token::Pause(PauseKind::Clause),
                word("ні"),
                Token::Pause(PauseKind::Clause),
            ]
        );
        assert_eq!(tokenize("так/ні"), vec![word("так"), word("ні")]);
        assert_eq!(
            tokenize("{мама} & *тато*"),
            vec![
                Token::Pause(PauseKind::Clause),
                word("мама"),
                Token::Pause(PauseKind::Clause),
                word("тато"),
            ]
        );
    }

    #[test]
    fn line_breaks_are_sentence_pauses() {
        assert_eq!(
            tokenize("сонце\nвітер"),
            vec![word("сонце"), Token::Pause(PauseKind::Sentence), word("вітер")]
        );
    }

    #[test]
    fn decimal_point_stays_in_word() {
        assert_eq!(
            tokenize("версія 2.0."),
            vec![word("версія"), word("2.0"), Token::Pause(PauseKind::Sentence)]
        );
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("").is_empty());
    }
}
