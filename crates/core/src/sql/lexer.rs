//! Minimal SQL surface lexer.
//!
//! Strips comments and string-literal bodies so the validator inspects only
//! real statement text. Literal content must never trigger a keyword match,
//! and comment tricks must never hide one.

/// Output of [`strip_comments_and_strings`]. When `terminated` is false the
/// input ended inside a string or block comment and must not be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedSql {
    /// Input with complete comments collapsed to a space and every string
    /// literal reduced to an empty `''`. Text after `--` that never reaches
    /// a newline is not a comment and passes through untouched.
    pub text: String,
    pub terminated: bool,
}

enum State {
    Normal,
    LineComment,
    BlockComment,
    StringBody,
}

/// Single-pass scanner over the raw SQL text. Handles `--` line comments,
/// non-nesting `/* */` block comments, and single-quoted strings with `''`
/// doubling. A line comment ends at a newline; with no newline the `--`
/// tail is still statement text and stays in the output. A backslash inside
/// a string is an ordinary character here, so a dialect that treats it as
/// an escape can only produce text we judge MORE conservatively, never
/// less.
pub fn strip_comments_and_strings(sql: &str) -> StrippedSql {
    let mut text = String::with_capacity(sql.len());
    let mut comment = String::new();
    let mut state = State::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            State::Normal => match ch {
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    comment.clear();
                    comment.push_str("--");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    text.push(' ');
                    state = State::BlockComment;
                }
                '\'' => {
                    text.push('\'');
                    state = State::StringBody;
                }
                other => text.push(other),
            },
            State::LineComment => {
                if ch == '\n' {
                    text.push(' ');
                    state = State::Normal;
                } else {
                    comment.push(ch);
                }
            }
            State::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                }
            }
            State::StringBody => {
                if ch == '\'' {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                    } else {
                        text.push('\'');
                        state = State::Normal;
                    }
                }
            }
        }
    }

    // Text after `--` only becomes a comment once its newline arrives, so
    // an end-of-input tail flows back out for the downstream checks.
    if matches!(state, State::LineComment) {
        text.push_str(&comment);
    }

    let terminated = matches!(state, State::Normal | State::LineComment);
    StrippedSql { text, terminated }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let out = strip_comments_and_strings("SELECT 1 FROM t");
        assert_eq!(out.text, "SELECT 1 FROM t");
        assert!(out.terminated);
    }

    #[test]
    fn string_bodies_are_dropped() {
        let out = strip_comments_and_strings("SELECT 'DROP TABLE trick' FROM t");
        assert_eq!(out.text, "SELECT '' FROM t");
        assert!(out.terminated);
    }

    #[test]
    fn doubled_quotes_stay_inside_the_string() {
        let out = strip_comments_and_strings("SELECT 'O''Brien; DELETE' FROM t");
        assert_eq!(out.text, "SELECT '' FROM t");
        assert!(out.terminated);
    }

    #[test]
    fn line_comments_collapse_to_a_space() {
        let out = strip_comments_and_strings("SELECT 1 -- DELETE FROM t\nFROM t");
        assert_eq!(out.text, "SELECT 1  FROM t");
        assert!(out.terminated);
    }

    #[test]
    fn line_comment_without_a_newline_stays_visible() {
        let out = strip_comments_and_strings("SELECT 1 FROM t -- trailing note");
        assert_eq!(out.text, "SELECT 1 FROM t -- trailing note");
        assert!(out.terminated);
    }

    #[test]
    fn line_comment_tail_cannot_swallow_a_semicolon() {
        let out = strip_comments_and_strings("SELECT 1 FROM t -- ; DROP TABLE x");
        assert!(out.text.contains(';'));
        assert!(out.text.contains("DROP TABLE x"));
        assert!(out.terminated);
    }

    #[test]
    fn block_comments_collapse_to_a_space() {
        let out = strip_comments_and_strings("SELECT /* hidden DROP */ 1 FROM t");
        assert_eq!(out.text, "SELECT   1 FROM t");
        assert!(out.terminated);
    }

    #[test]
    fn unterminated_block_comment_is_flagged() {
        let out = strip_comments_and_strings("SELECT 1 /* still open");
        assert!(!out.terminated);
    }

    #[test]
    fn unterminated_string_is_flagged() {
        let out = strip_comments_and_strings("SELECT 'never closed");
        assert!(!out.terminated);
    }

    #[test]
    fn backslash_does_not_escape_the_closing_quote() {
        // In a backslash-escaping dialect this would be one long literal
        // hiding the DROP. Closing the string early exposes it instead.
        let out = strip_comments_and_strings(r"SELECT '\'; DROP TABLE x; --' FROM t");
        assert!(out.terminated);
        assert!(out.text.contains("DROP TABLE x"));
    }
}
