//! Parsed operand model.
//!
//! The parser turns each statement into an [`OperandVector`]: the mnemonic
//! as a token, followed by registers, immediates, and the literal tokens
//! (`<`, `>`, `[`, `]`) that give bitfield and scaled-index syntax their
//! shape. The matcher then checks each element against an operand class and
//! materializes the survivors into an [`McInst`].

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::Span;
use crate::ir::{Expr, McInst, McOperand};
use crate::registers::{RegClass, Register};

/// Ordered operands of one statement, mnemonic token first.
pub type OperandVector = Vec<ParsedOperand>;

/// One parsed operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedOperand {
    /// Literal spelling: the mnemonic or a punctuation token.
    Token {
        /// Spelling, e.g. `"ld.bu"` or `"<"`.
        text: String,
        /// Where it was written (zero-length for synthetic tokens).
        span: Span,
    },
    /// A physical register.
    Register {
        /// The register.
        reg: Register,
        /// First token of the operand.
        start: Span,
        /// Last token of the operand.
        end: Span,
    },
    /// An immediate expression. `None` materializes as 0.
    Immediate {
        /// Value, possibly symbolic.
        expr: Option<Expr>,
        /// First token of the operand.
        start: Span,
        /// Last token of the operand.
        end: Span,
    },
}

impl ParsedOperand {
    /// Token operand.
    pub fn token(text: impl Into<String>, span: Span) -> Self {
        ParsedOperand::Token {
            text: text.into(),
            span,
        }
    }

    /// Register operand.
    pub fn register(reg: Register, start: Span, end: Span) -> Self {
        ParsedOperand::Register { reg, start, end }
    }

    /// Immediate operand.
    pub fn immediate(expr: Option<Expr>, start: Span, end: Span) -> Self {
        ParsedOperand::Immediate { expr, start, end }
    }

    /// Immediate holding a literal value.
    pub fn constant(value: i64, start: Span, end: Span) -> Self {
        Self::immediate(Some(Expr::Num(value)), start, end)
    }

    /// Is this a token?
    pub fn is_token(&self) -> bool {
        matches!(self, ParsedOperand::Token { .. })
    }

    /// Is this a register?
    pub fn is_reg(&self) -> bool {
        matches!(self, ParsedOperand::Register { .. })
    }

    /// Is this an immediate?
    pub fn is_imm(&self) -> bool {
        matches!(self, ParsedOperand::Immediate { .. })
    }

    /// Token spelling.
    pub fn token_text(&self) -> Option<&str> {
        match self {
            ParsedOperand::Token { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Register payload.
    pub fn reg(&self) -> Option<Register> {
        match self {
            ParsedOperand::Register { reg, .. } => Some(*reg),
            _ => None,
        }
    }

    /// Is this a register of the given class?
    pub fn is_reg_class(&self, class: RegClass) -> bool {
        self.reg().is_some_and(|r| r.class() == class)
    }

    /// Immediate payload. Outer `None` when this is not an immediate.
    pub fn imm(&self) -> Option<Option<&Expr>> {
        match self {
            ParsedOperand::Immediate { expr, .. } => Some(expr.as_ref()),
            _ => None,
        }
    }

    /// Literal value of an immediate. An absent expression counts as 0.
    pub fn constant_value(&self) -> Option<i64> {
        match self.imm()? {
            None => Some(0),
            Some(e) => e.as_constant(),
        }
    }

    /// Start location.
    pub fn start(&self) -> Span {
        match self {
            ParsedOperand::Token { span, .. } => *span,
            ParsedOperand::Register { start, .. } | ParsedOperand::Immediate { start, .. } => {
                *start
            }
        }
    }

    /// End location.
    pub fn end(&self) -> Span {
        match self {
            ParsedOperand::Token { span, .. } => *span,
            ParsedOperand::Register { end, .. } | ParsedOperand::Immediate { end, .. } => *end,
        }
    }

    /// Literal immediate within `[lo, hi]`.
    pub fn is_imm_in_range(&self, lo: i64, hi: i64) -> bool {
        self.constant_value().is_some_and(|v| (lo..=hi).contains(&v))
    }

    /// Unsigned 5-bit immediate.
    pub fn is_u5_imm(&self) -> bool {
        self.is_imm_in_range(0, 31)
    }

    /// Unsigned 16-bit immediate.
    pub fn is_u16_imm(&self) -> bool {
        self.is_imm_in_range(0, 0xffff)
    }

    /// Signed 16-bit immediate.
    pub fn is_s16_imm(&self) -> bool {
        self.is_imm_in_range(-0x8000, 0x7fff)
    }

    /// `%hi16(..)` or `%lo16(..)`: a 16-bit half filled in by relocation.
    pub fn is_reloc16(&self) -> bool {
        matches!(self.imm(), Some(Some(Expr::Target(..))))
    }

    /// Trap vector number.
    pub fn is_vec9(&self) -> bool {
        self.is_imm_in_range(0, 511)
    }

    /// Bitfield width.
    pub fn is_bf_width(&self) -> bool {
        self.is_imm_in_range(0, 31)
    }

    /// Bitfield offset.
    pub fn is_bf_offset(&self) -> bool {
        self.is_imm_in_range(0, 31)
    }

    /// Pixel rotation amount. The parser has already cleared the low bits.
    pub fn is_pixel_rot(&self) -> bool {
        self.is_imm_in_range(0, 60)
    }

    /// Condition-code field.
    pub fn is_ccode(&self) -> bool {
        self.is_u5_imm()
    }

    /// Append this operand's machine-code form to `inst`.
    ///
    /// Registers add a register operand. Immediates add an immediate when
    /// the value is a literal and an expression otherwise. Tokens only
    /// carry syntax and add nothing.
    pub fn add_to(&self, inst: &mut McInst) {
        match self {
            ParsedOperand::Token { .. } => {}
            ParsedOperand::Register { reg, .. } => inst.push(McOperand::Reg(*reg)),
            ParsedOperand::Immediate { expr: None, .. } => inst.push(McOperand::Imm(0)),
            ParsedOperand::Immediate { expr: Some(e), .. } => match e.as_constant() {
                Some(v) => inst.push(McOperand::Imm(v)),
                None => inst.push(McOperand::Expr(e.clone())),
            },
        }
    }
}

impl fmt::Display for ParsedOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedOperand::Token { text, .. } => write!(f, "Token: {}", text),
            ParsedOperand::Register { reg, .. } => write!(f, "Reg: %{}", reg),
            ParsedOperand::Immediate { expr: None, .. } => write!(f, "Imm: 0"),
            ParsedOperand::Immediate { expr: Some(e), .. } => write!(f, "Imm: {}", e),
        }
    }
}
