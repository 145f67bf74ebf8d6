//! Lexer for m88k assembly source text.
//!
//! The lexer tokenizes assembly source into a stream of [`Token`](crate::lexer::Token)s, each
//! carrying its [`Span`](crate::error::Span) (source position) so that error messages can
//! point back to the exact location in the original input.
//!
//! Mnemonics may contain dots (`ld.bu`, `bb1.n`, `fadd.ddd`), so `.` is an
//! identifier character after the first position. A leading `.` starts a
//! directive.

use alloc::borrow::Cow;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;
use core::str;

use crate::error::{AsmError, Span};

/// A token produced by the lexer.
///
/// Token text is borrowed from the source string in the common case, avoiding
/// per-token heap allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'src> {
    /// Token classification.
    pub kind: TokenKind,
    /// Source text of the token.
    pub text: Cow<'src, str>,
    /// Source location.
    pub span: Span,
}

impl<'src> Token<'src> {
    /// Returns the token text as a `&str`.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Integer value of a [`TokenKind::Number`] token.
    #[inline]
    pub fn int_value(&self) -> Option<i64> {
        match self.kind {
            TokenKind::Number(n) => Some(n),
            _ => None,
        }
    }
}

/// The type of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An identifier: mnemonic, register name, symbol or condition keyword.
    Ident,
    /// A numeric literal (integer or character constant).
    Number(i64),
    /// A directive (starts with `.`).
    Directive,
    /// Label definition (`name:`).
    LabelDef,
    /// Comma separator.
    Comma,
    /// Open bracket `[` (scaled register).
    LBrac,
    /// Close bracket `]`.
    RBrac,
    /// Less-than `<` (bitfield offset / rotation).
    Less,
    /// Greater-than `>`.
    Greater,
    /// Percent sign `%` (register prefix).
    Percent,
    /// Plus `+`.
    Plus,
    /// Minus `-`.
    Minus,
    /// Asterisk `*`.
    Star,
    /// Forward slash `/`.
    Slash,
    /// Open parenthesis `(`.
    LParen,
    /// Close parenthesis `)`.
    RParen,
    /// Tilde `~`.
    Tilde,
    /// Ampersand `&`.
    Ampersand,
    /// Pipe `|`.
    Pipe,
    /// Caret `^`.
    Caret,
    /// Left shift `<<`.
    LShift,
    /// Right shift `>>`.
    RShift,
    /// A newline (statement separator).
    Newline,
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Single-byte punctuation lookup.
    fn punct(ch: u8) -> Option<TokenKind> {
        Some(match ch {
            b',' => TokenKind::Comma,
            b'[' => TokenKind::LBrac,
            b']' => TokenKind::RBrac,
            b'<' => TokenKind::Less,
            b'>' => TokenKind::Greater,
            b'%' => TokenKind::Percent,
            b'+' => TokenKind::Plus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'~' => TokenKind::Tilde,
            b'&' => TokenKind::Ampersand,
            b'|' => TokenKind::Pipe,
            b'^' => TokenKind::Caret,
            _ => return None,
        })
    }
}

/// Tokenize assembly source text into a vector of tokens.
///
/// The lexer recognizes:
/// - Identifiers (mnemonics, register names, symbols), dots allowed after the first character
/// - Numeric literals (decimal, hex `0x`, binary `0b`, octal `0o`) and character constants
/// - Directives (`.requires_88110`)
/// - Label definitions (`name:`)
/// - Punctuation: `, [ ] < > % + - * / ( ) ~ & | ^ << >>`
/// - Comments: `;` or `#` to end of line, `//` to end of line, `/* ... */`
/// - Newlines as statement separators
///
/// # Errors
///
/// Returns `Err(AsmError::Syntax)` if the input contains an unrecognised
/// character or a malformed token.
pub fn tokenize<'s>(source: &'s str) -> Result<Vec<Token<'s>>, AsmError> {
    let mut tokens = Vec::with_capacity(source.len() / 3 + 1);
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut pos = 0;
    let mut line: u32 = 1;
    let mut col: u32 = 1;
    let mut line_start = 0usize;

    while pos < len {
        let ch = bytes[pos];

        // Skip whitespace (but not newlines)
        if ch == b' ' || ch == b'\t' || ch == b'\r' {
            pos += 1;
            col += 1;
            continue;
        }

        if ch == b'\n' {
            tokens.push(Token {
                kind: TokenKind::Newline,
                text: Cow::Borrowed("\n"),
                span: Span::new(line, col, pos, 1),
            });
            pos += 1;
            line += 1;
            col = 1;
            line_start = pos;
            continue;
        }

        // Comment: ; or # to EOL
        if ch == b';' || ch == b'#' || (ch == b'/' && pos + 1 < len && bytes[pos + 1] == b'/') {
            while pos < len && bytes[pos] != b'\n' {
                pos += 1;
            }
            col = (pos - line_start) as u32 + 1;
            continue;
        }

        if ch == b'/' && pos + 1 < len && bytes[pos + 1] == b'*' {
            let comment_start = Span::new(line, col, pos, 2);
            pos += 2;
            col += 2;
            while pos + 1 < len && !(bytes[pos] == b'*' && bytes[pos + 1] == b'/') {
                if bytes[pos] == b'\n' {
                    line += 1;
                    col = 1;
                    line_start = pos + 1;
                } else {
                    col += 1;
                }
                pos += 1;
            }
            if pos + 1 >= len {
                return Err(AsmError::syntax("unterminated block comment", comment_start));
            }
            pos += 2;
            col += 2;
            continue;
        }

        // Shift operators << >>
        if (ch == b'<' || ch == b'>') && pos + 1 < len && bytes[pos + 1] == ch {
            let (kind, text) = if ch == b'<' {
                (TokenKind::LShift, "<<")
            } else {
                (TokenKind::RShift, ">>")
            };
            tokens.push(Token {
                kind,
                text: Cow::Borrowed(text),
                span: Span::new(line, col, pos, 2),
            });
            pos += 2;
            col += 2;
            continue;
        }

        if ch == b'-' {
            // Negative literal when the minus cannot be a binary operator.
            let is_unary = matches!(
                tokens.last().map(|t: &Token<'_>| t.kind),
                None | Some(
                    TokenKind::Comma
                        | TokenKind::LBrac
                        | TokenKind::Less
                        | TokenKind::LParen
                        | TokenKind::Plus
                        | TokenKind::Minus
                        | TokenKind::Star
                        | TokenKind::Slash
                        | TokenKind::Newline
                )
            );
            if is_unary && pos + 1 < len && bytes[pos + 1].is_ascii_digit() {
                let start = pos;
                let start_col = col;
                pos += 1;
                let value = parse_number_at(bytes, &mut pos, line, start_col)?;
                tokens.push(Token {
                    kind: TokenKind::Number(value.wrapping_neg()),
                    text: Cow::Borrowed(str::from_utf8(&bytes[start..pos]).unwrap_or("")),
                    span: Span::new(line, start_col, start, pos - start),
                });
                col = (pos - line_start) as u32 + 1;
                continue;
            }
            tokens.push(Token {
                kind: TokenKind::Minus,
                text: Cow::Borrowed("-"),
                span: Span::new(line, col, pos, 1),
            });
            pos += 1;
            col += 1;
            continue;
        }

        if let Some(kind) = TokenKind::punct(ch) {
            tokens.push(Token {
                kind,
                text: Cow::Borrowed(str::from_utf8(&bytes[pos..pos + 1]).unwrap_or("")),
                span: Span::new(line, col, pos, 1),
            });
            pos += 1;
            col += 1;
            continue;
        }

        // Character literal
        if ch == b'\'' {
            let start = pos;
            let start_col = col;
            pos += 1;
            let value = match bytes.get(pos) {
                Some(b'\\') => {
                    pos += 1;
                    match bytes.get(pos) {
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        Some(b'\\') => b'\\',
                        Some(b'\'') => b'\'',
                        Some(b'0') => 0,
                        _ => {
                            return Err(AsmError::syntax(
                                "unknown escape in character literal",
                                Span::new(line, start_col, start, pos - start),
                            ));
                        }
                    }
                }
                Some(&b) if b != b'\n' => b,
                _ => {
                    return Err(AsmError::syntax(
                        "unterminated character literal",
                        Span::new(line, start_col, start, 1),
                    ));
                }
            };
            pos += 1;
            if bytes.get(pos) != Some(&b'\'') {
                return Err(AsmError::syntax(
                    "unterminated character literal",
                    Span::new(line, start_col, start, pos - start),
                ));
            }
            pos += 1;
            tokens.push(Token {
                kind: TokenKind::Number(i64::from(value)),
                text: Cow::Borrowed(str::from_utf8(&bytes[start..pos]).unwrap_or("")),
                span: Span::new(line, start_col, start, pos - start),
            });
            col = (pos - line_start) as u32 + 1;
            continue;
        }

        // Directive (starts with '.')
        if ch == b'.' {
            let start = pos;
            let start_col = col;
            pos += 1;
            while pos < len && is_ident_continue(bytes[pos]) {
                pos += 1;
            }
            let text = Cow::Borrowed(str::from_utf8(&bytes[start..pos]).unwrap_or(""));
            // Local labels such as `.LBB0_2:` share the directive spelling.
            let kind = if pos < len && bytes[pos] == b':' {
                pos += 1;
                TokenKind::LabelDef
            } else {
                TokenKind::Directive
            };
            tokens.push(Token {
                kind,
                text,
                span: Span::new(line, start_col, start, pos - start),
            });
            col = (pos - line_start) as u32 + 1;
            continue;
        }

        if ch.is_ascii_digit() {
            let start = pos;
            let start_col = col;
            let value = parse_number_at(bytes, &mut pos, line, start_col)?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                text: Cow::Borrowed(str::from_utf8(&bytes[start..pos]).unwrap_or("")),
                span: Span::new(line, start_col, start, pos - start),
            });
            col = (pos - line_start) as u32 + 1;
            continue;
        }

        // Identifier, mnemonic, or label definition
        if ch.is_ascii_alphabetic() || ch == b'_' || ch == b'$' {
            let start = pos;
            let start_col = col;
            while pos < len && is_ident_continue(bytes[pos]) {
                pos += 1;
            }
            let text = Cow::Borrowed(str::from_utf8(&bytes[start..pos]).unwrap_or(""));
            if pos < len && bytes[pos] == b':' {
                pos += 1;
                tokens.push(Token {
                    kind: TokenKind::LabelDef,
                    text,
                    span: Span::new(line, start_col, start, pos - start),
                });
            } else {
                tokens.push(Token {
                    kind: TokenKind::Ident,
                    text,
                    span: Span::new(line, start_col, start, pos - start),
                });
            }
            col = (pos - line_start) as u32 + 1;
            continue;
        }

        return Err(AsmError::syntax(
            alloc::format!("unexpected character '{}'", ch as char),
            Span::new(line, col, pos, 1),
        ));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: Cow::Borrowed(""),
        span: Span::new(line, col, pos, 0),
    });

    Ok(tokens)
}

#[inline]
fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'$'
}

/// Parse a number starting at `pos` in `bytes`. Advances `pos` past the number.
fn parse_number_at(
    bytes: &[u8],
    pos: &mut usize,
    span_line: u32,
    span_col: u32,
) -> Result<i64, AsmError> {
    let start = *pos;
    let len = bytes.len();

    let radix = if bytes[*pos] == b'0' && *pos + 1 < len {
        match bytes[*pos + 1] {
            b'x' | b'X' => 16,
            b'b' | b'B' => 2,
            b'o' | b'O' => 8,
            _ => 10,
        }
    } else {
        10
    };
    if radix != 10 {
        *pos += 2;
    }
    let digits_start = *pos;
    while *pos < len && bytes[*pos].is_ascii_alphanumeric() {
        *pos += 1;
    }
    let digits = str::from_utf8(&bytes[digits_start..*pos]).unwrap_or("");
    let span = Span::new(span_line, span_col, start, *pos - start);
    if digits.is_empty() {
        return Err(AsmError::syntax("expected digits after radix prefix", span));
    }
    // Values up to u64::MAX are accepted and reinterpreted as two's complement.
    u64::from_str_radix(digits, radix)
        .map(|v| v as i64)
        .map_err(|_| {
            let text = str::from_utf8(&bytes[start..*pos]).unwrap_or("");
            AsmError::syntax(alloc::format!("invalid number '{}'", text), span)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok_kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_input() {
        let tokens = tokenize("").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(tok_kinds("; comment"), vec![TokenKind::Eof]);
        assert_eq!(tok_kinds("# comment"), vec![TokenKind::Eof]);
        assert_eq!(tok_kinds("/* block */ // line"), vec![TokenKind::Eof]);
    }

    #[test]
    fn register_instruction() {
        let kinds = tok_kinds("add %r1, %r2, %r3");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident, // add
                TokenKind::Percent,
                TokenKind::Ident, // r1
                TokenKind::Comma,
                TokenKind::Percent,
                TokenKind::Ident, // r2
                TokenKind::Comma,
                TokenKind::Percent,
                TokenKind::Ident, // r3
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dotted_mnemonic_is_one_identifier() {
        let tokens = tokenize("ld.bu %r2, %r3, 0").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].text, "ld.bu");
    }

    #[test]
    fn bitfield_sugar_tokens() {
        let kinds = tok_kinds("ext %r1, %r2, 5<3>");
        assert_eq!(
            &kinds[7..],
            &[
                TokenKind::Number(5),
                TokenKind::Less,
                TokenKind::Number(3),
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn shift_operators_are_not_angles() {
        let kinds = tok_kinds("1 << 2 >> 1");
        assert_eq!(kinds[1], TokenKind::LShift);
        assert_eq!(kinds[3], TokenKind::RShift);
    }

    #[test]
    fn scaled_register_tokens() {
        let kinds = tok_kinds("ld %r1, %r2[%r3]");
        assert_eq!(kinds[6], TokenKind::LBrac);
        assert_eq!(kinds[9], TokenKind::RBrac);
    }

    #[test]
    fn number_radixes() {
        let tokens = tokenize("0x1F 0b101 0o17 42").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number(31));
        assert_eq!(tokens[1].kind, TokenKind::Number(5));
        assert_eq!(tokens[2].kind, TokenKind::Number(15));
        assert_eq!(tokens[3].kind, TokenKind::Number(42));
    }

    #[test]
    fn negative_after_comma() {
        let tokens = tokenize("addu %r1, %r2, -4").unwrap();
        assert_eq!(tokens[7].kind, TokenKind::Number(-4));
    }

    #[test]
    fn minus_after_identifier_is_operator() {
        let kinds = tok_kinds("foo-4");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Minus,
                TokenKind::Number(4),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn char_literal_is_number() {
        let tokens = tokenize("'A'").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number(65));
    }

    #[test]
    fn directive_and_label() {
        let tokens = tokenize("start: .requires_88110").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::LabelDef);
        assert_eq!(tokens[0].text, "start");
        assert_eq!(tokens[1].kind, TokenKind::Directive);
        assert_eq!(tokens[1].text, ".requires_88110");
    }

    #[test]
    fn local_label_definition() {
        let tokens = tokenize(".LBB0_2: br .LBB0_2").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::LabelDef);
        assert_eq!(tokens[0].text, ".LBB0_2");
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[2].kind, TokenKind::Directive);
        assert_eq!(tokens[2].text, ".LBB0_2");
    }

    #[test]
    fn span_tracking() {
        let tokens = tokenize("or %r1, %r0, 1").unwrap();
        assert_eq!(tokens[0].span, Span::new(1, 1, 0, 2)); // "or"
        assert_eq!(tokens[1].span, Span::new(1, 4, 3, 1)); // "%"
        assert_eq!(tokens[2].span, Span::new(1, 5, 4, 2)); // "r1"
    }

    #[test]
    fn multiline_span_tracking() {
        let tokens = tokenize("jmp %r1\nor %r0, %r0, %r0").unwrap();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[4].span.line, 2);
    }

    #[test]
    fn unknown_character_error() {
        let err = tokenize("add %r1, @").unwrap_err();
        match err {
            AsmError::Syntax { msg, .. } => assert!(msg.contains("unexpected character '@'")),
            _ => panic!("expected Syntax error"),
        }
    }

    #[test]
    fn bad_hex_digits() {
        assert!(tokenize("0x").is_err());
        assert!(tokenize("0xZZ").is_err());
    }

    #[test]
    fn unterminated_block_comment() {
        let err = tokenize("or /* never closed").unwrap_err();
        match err {
            AsmError::Syntax { msg, span } => {
                assert!(msg.contains("unterminated block comment"));
                assert_eq!(span.col, 4);
            }
            _ => panic!("expected Syntax error"),
        }
    }
}
