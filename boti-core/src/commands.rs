// ABOUTME: Command line tokenizer for incoming chat text
// ABOUTME: Shell-words splitting with quoting and backslash escapes

use crate::error::ParseError;

/// Split a line of chat text into words.
///
/// Whitespace separates words. Single quotes preserve their contents
/// literally; double quotes allow `\"`, `\\`, `\$` and `` \` `` escapes.
/// Outside quotes a backslash makes the next character literal. Adjacent
/// quoted and unquoted pieces join into a single word, and `""` yields an
/// empty word.
///
/// Empty or whitespace-only input yields no words.
///
/// # Examples
///
/// ```
/// use boti_core::commands::parse;
///
/// let tokens = parse("twitter new \"hello world\"").unwrap();
/// assert_eq!(tokens, vec!["twitter", "new", "hello world"]);
/// ```
pub fn parse(input: &str) -> Result<Vec<String>, ParseError> {
    let mut words = Vec::new();
    let mut current = String::new();
    // Distinguishes "no word yet" from an empty quoted word
    let mut in_word = false;
    let mut chars = input.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some((_, '\'')) => break,
                        Some((_, c)) => current.push(c),
                        None => {
                            return Err(ParseError::UnbalancedQuote {
                                quote: '\'',
                                position,
                            })
                        }
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, '\\')) => match chars.next() {
                            Some((_, escaped @ ('"' | '\\' | '$' | '`'))) => current.push(escaped),
                            Some((_, other)) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => {
                                return Err(ParseError::UnbalancedQuote {
                                    quote: '"',
                                    position,
                                })
                            }
                        },
                        Some((_, c)) => current.push(c),
                        None => {
                            return Err(ParseError::UnbalancedQuote {
                                quote: '"',
                                position,
                            })
                        }
                    }
                }
            }
            '\\' => match chars.next() {
                Some((_, escaped)) => {
                    in_word = true;
                    current.push(escaped);
                }
                None => return Err(ParseError::DanglingEscape),
            },
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        words.push(current);
    }

    Ok(words)
}
