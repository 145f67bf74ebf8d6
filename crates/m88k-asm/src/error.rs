//! Error types and source span tracking for diagnostics.

#[allow(unused_imports)]
use alloc::format;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

/// Source location for diagnostics.
///
/// Tracks the line, column, byte offset, and length of a token or construct
/// in the original assembly source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (byte offset within line).
    pub col: u32,
    /// 0-based byte offset from start of source.
    pub offset: usize,
    /// Byte length of the spanned region.
    pub len: usize,
}

impl Span {
    /// Create a new span.
    #[must_use]
    pub fn new(line: u32, col: u32, offset: usize, len: usize) -> Self {
        Self {
            line,
            col,
            offset,
            len,
        }
    }

    /// A dummy span for generated/internal constructs.
    #[must_use]
    pub fn dummy() -> Self {
        Self {
            line: 0,
            col: 0,
            offset: 0,
            len: 0,
        }
    }

    /// Span starting at `self` and running up to the end of `end`.
    ///
    /// Falls back to `self` when `end` lies before the start.
    #[must_use]
    pub fn to(self, end: Span) -> Self {
        let stop = end.offset + end.len;
        if stop < self.offset {
            return self;
        }
        Self {
            len: stop - self.offset,
            ..self
        }
    }

    /// Byte offset one past the last spanned byte.
    #[must_use]
    pub fn end_offset(&self) -> usize {
        self.offset + self.len
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Operand-class specific match diagnostics.
///
/// Operand classes that carry their own diagnostic report these instead of
/// the generic "Invalid operand for instruction".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchDiag {
    /// Bitfield width outside `[0, 31]`.
    InvalidBitfieldWidth,
    /// Bitfield offset outside `[0, 31]`.
    InvalidBitfieldOffset,
    /// Pixel rotation amount outside `[0, 60]`.
    InvalidPixelRotationSize,
}

impl MatchDiag {
    /// Human-readable diagnostic text.
    pub fn message(self) -> &'static str {
        match self {
            MatchDiag::InvalidBitfieldWidth => "bitfield width must be in range [0, 31]",
            MatchDiag::InvalidBitfieldOffset => "bitfield offset must be in range [0, 31]",
            MatchDiag::InvalidPixelRotationSize => {
                "pixel rotation size must be a multiple of 4 in range [0, 60]"
            }
        }
    }
}

/// Assembly error with source location and descriptive message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsmError {
    /// Syntax error during lexing or parsing.
    Syntax {
        /// The syntax error message.
        msg: String,
        /// Source location of the syntax error.
        span: Span,
    },

    /// Mnemonic not present in the instruction table.
    UnknownMnemonic {
        /// The mnemonic that was not recognized.
        mnemonic: String,
        /// Spelling suggestion, already formatted (`", did you mean: x?"`) or empty.
        suggestion: String,
        /// Source location of the mnemonic.
        span: Span,
    },

    /// An operand does not fit any encoding of the instruction.
    InvalidOperand {
        /// Source location of the offending operand.
        span: Span,
    },

    /// An operand failed a class that carries its own diagnostic.
    OperandDiagnostic {
        /// Which operand class rejected the operand.
        diag: MatchDiag,
        /// Source location of the offending operand.
        span: Span,
    },

    /// The instruction line ended before all operands were supplied.
    TooFewOperands {
        /// Set when the missing operand belongs to a class with its own diagnostic.
        diag: Option<MatchDiag>,
        /// Source location of the instruction.
        span: Span,
    },

    /// Instruction exists but needs features that are not enabled.
    MissingFeatures {
        /// Names of every missing feature.
        features: Vec<String>,
        /// Source location of the instruction.
        span: Span,
    },

    /// A configured resource limit was exceeded.
    ResourceLimitExceeded {
        /// Which resource ran out.
        resource: String,
        /// The configured limit.
        limit: usize,
    },

    /// Multiple errors collected during assembly.
    Multiple {
        /// The collected assembly errors.
        errors: Vec<AsmError>,
    },
}

impl AsmError {
    /// Shorthand for [`AsmError::Syntax`].
    pub fn syntax(msg: impl Into<String>, span: Span) -> Self {
        AsmError::Syntax {
            msg: msg.into(),
            span,
        }
    }

    /// Primary source location, if the error has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            AsmError::Syntax { span, .. }
            | AsmError::UnknownMnemonic { span, .. }
            | AsmError::InvalidOperand { span }
            | AsmError::OperandDiagnostic { span, .. }
            | AsmError::TooFewOperands { span, .. }
            | AsmError::MissingFeatures { span, .. } => Some(*span),
            AsmError::ResourceLimitExceeded { .. } => None,
            AsmError::Multiple { errors } => errors.first().and_then(AsmError::span),
        }
    }

    /// Flatten into the list of individual errors.
    pub fn into_errors(self) -> Vec<AsmError> {
        match self {
            AsmError::Multiple { errors } => errors,
            other => vec![other],
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmError::Syntax { msg, span } => {
                write!(f, "{}: {}", span, msg)
            }
            AsmError::UnknownMnemonic {
                suggestion, span, ..
            } => {
                write!(f, "{}: invalid instruction{}", span, suggestion)
            }
            AsmError::InvalidOperand { span } => {
                write!(f, "{}: Invalid operand for instruction", span)
            }
            AsmError::OperandDiagnostic { diag, span } => {
                write!(f, "{}: {}", span, diag.message())
            }
            AsmError::TooFewOperands { diag: None, span } => {
                write!(f, "{}: Too few operands for instruction", span)
            }
            AsmError::TooFewOperands { diag: Some(_), span } => {
                write!(f, "{}: too few operands for instruction", span)
            }
            AsmError::MissingFeatures { features, span } => {
                write!(f, "{}: instruction requires the following:", span)?;
                for (i, name) in features.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{}{}", sep, name)?;
                }
                Ok(())
            }
            AsmError::ResourceLimitExceeded { resource, limit } => {
                write!(f, "resource limit exceeded: {} (limit: {})", resource, limit)
            }
            AsmError::Multiple { errors } => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AsmError {}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Informational; assembly continues unchanged.
    Warning,
    /// The statement was rejected.
    Error,
}

/// A reported diagnostic that does not by itself stop assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// Warning or error.
    pub severity: Severity,
    /// Message text without location prefix.
    pub message: String,
    /// Source location.
    pub span: Span,
}

impl Diagnostic {
    /// Create a warning.
    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}: {}", self.span, level, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_display() {
        let span = Span::new(3, 12, 45, 5);
        assert_eq!(format!("{}", span), "3:12");
    }

    #[test]
    fn span_dummy() {
        let span = Span::dummy();
        assert_eq!(span.line, 0);
        assert_eq!(span.col, 0);
    }

    #[test]
    fn span_to_covers_both_ends() {
        let start = Span::new(1, 5, 4, 1);
        let end = Span::new(1, 7, 6, 3);
        let joined = start.to(end);
        assert_eq!(joined.offset, 4);
        assert_eq!(joined.len, 5);
        assert_eq!(joined.end_offset(), 9);
    }

    #[test]
    fn span_to_backwards_keeps_start() {
        let start = Span::new(1, 9, 8, 2);
        let end = Span::new(1, 1, 0, 1);
        assert_eq!(start.to(end), start);
    }

    #[test]
    fn error_syntax_display() {
        let err = AsmError::syntax("unexpected token in argument list", Span::new(1, 5, 4, 1));
        assert_eq!(format!("{}", err), "1:5: unexpected token in argument list");
    }

    #[test]
    fn error_unknown_mnemonic_display() {
        let err = AsmError::UnknownMnemonic {
            mnemonic: "ad".into(),
            suggestion: ", did you mean: add, and?".into(),
            span: Span::new(3, 2, 0, 2),
        };
        assert_eq!(
            format!("{}", err),
            "3:2: invalid instruction, did you mean: add, and?"
        );
    }

    #[test]
    fn error_invalid_operand_display() {
        let err = AsmError::InvalidOperand {
            span: Span::new(2, 9, 20, 3),
        };
        assert_eq!(format!("{}", err), "2:9: Invalid operand for instruction");
    }

    #[test]
    fn error_too_few_operands_wording() {
        let generic = AsmError::TooFewOperands {
            diag: None,
            span: Span::new(1, 1, 0, 3),
        };
        let specific = AsmError::TooFewOperands {
            diag: Some(MatchDiag::InvalidBitfieldOffset),
            span: Span::new(1, 1, 0, 3),
        };
        assert_eq!(
            format!("{}", generic),
            "1:1: Too few operands for instruction"
        );
        assert_eq!(
            format!("{}", specific),
            "1:1: too few operands for instruction"
        );
    }

    #[test]
    fn error_missing_features_lists_all() {
        let err = AsmError::MissingFeatures {
            features: vec!["mc88110".into(), "graphics".into()],
            span: Span::new(4, 1, 30, 4),
        };
        assert_eq!(
            format!("{}", err),
            "4:1: instruction requires the following: mc88110, graphics"
        );
    }

    #[test]
    fn error_multiple_display() {
        let err = AsmError::Multiple {
            errors: vec![
                AsmError::syntax("err1", Span::new(1, 1, 0, 1)),
                AsmError::syntax("err2", Span::new(2, 1, 5, 1)),
            ],
        };
        let s = format!("{}", err);
        assert!(s.contains("err1"));
        assert!(s.contains("err2"));
        assert_eq!(err.span(), Some(Span::new(1, 1, 0, 1)));
    }

    #[test]
    fn resource_limit_display() {
        let err = AsmError::ResourceLimitExceeded {
            resource: "source bytes".into(),
            limit: 16,
        };
        assert_eq!(format!("{}", err), "resource limit exceeded: source bytes (limit: 16)");
        assert_eq!(err.span(), None);
    }

    #[test]
    fn into_errors_flattens() {
        let single = AsmError::InvalidOperand {
            span: Span::dummy(),
        };
        assert_eq!(single.clone().into_errors(), vec![single]);
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic::warning("Removed lower 2 bits of expression", Span::new(1, 14, 13, 1));
        assert_eq!(
            format!("{}", d),
            "1:14: warning: Removed lower 2 bits of expression"
        );
    }
}
