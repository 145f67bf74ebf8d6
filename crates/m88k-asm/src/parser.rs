//! Statement parser for M88k assembly.
//!
//! [`AsmParser`] walks a token stream one statement at a time. Instruction
//! statements become an [`OperandVector`] which is handed to the
//! [`InstructionMatcher`]; matched instructions go to a [`Streamer`].
//!
//! Operand syntax is mostly positional. After the mnemonic come up to three
//! comma-separated operands, optionally followed by a bitfield offset
//! (`w<o>`) or, after the second operand, a scaled index (`rS1[rS2]`).
//! Operand classes with unusual spellings (bitfield width/offset, pixel
//! rotation, condition codes, branch displacements) are parsed by custom
//! sub-parsers chosen from the operand class the matcher expects at that
//! position.
//!
//! Errors abandon the current statement; [`AsmParser::run`] skips to the next
//! line and keeps going so that every bad line is reported.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{AsmError, Diagnostic, Span};
use crate::features::{Cpu, FeatureBits};
use crate::ir::{Expr, VariantKind};
use crate::lexer::{Token, TokenKind};
use crate::matcher::{CustomParser, InstructionMatcher, MatchOutcome};
use crate::operand::{OperandVector, ParsedOperand};
use crate::registers::{RegClass, Register};
use crate::streamer::Streamer;
use crate::table::OperandClass;

static EOF: Token<'static> = Token {
    kind: TokenKind::Eof,
    text: Cow::Borrowed(""),
    span: Span {
        line: 0,
        col: 0,
        offset: 0,
        len: 0,
    },
};

/// Three-way result of a sub-parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseStatus<T = ()> {
    /// The construct was recognized and consumed.
    Success(T),
    /// The construct does not start here. Nothing was consumed.
    NoMatch,
    /// The construct started but is malformed. `None` leaves the message to
    /// the caller.
    Failure(Option<AsmError>),
}

impl<T> ParseStatus<T> {
    /// `true` for [`ParseStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, ParseStatus::Success(_))
    }

    /// `true` for [`ParseStatus::NoMatch`].
    pub fn is_no_match(&self) -> bool {
        matches!(self, ParseStatus::NoMatch)
    }

    /// `true` for [`ParseStatus::Failure`].
    pub fn is_failure(&self) -> bool {
        matches!(self, ParseStatus::Failure(_))
    }
}

/// A register as written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRef {
    /// The resolved register.
    pub reg: Register,
    /// Location of the `%`.
    pub start: Span,
    /// Location of the register name.
    pub end: Span,
}

/// Operand-class hook consulted by the matcher after its generic check.
///
/// A GPR64 slot accepts any 32-bit GPR, even or odd; the pair is implied.
pub fn validate_target_operand_class(op: &ParsedOperand, class: OperandClass) -> bool {
    class == OperandClass::Gpr64 && op.is_reg_class(RegClass::Gpr)
}

/// Condition keywords accepted where a condition code is expected.
fn condition_code(name: &str) -> Option<i64> {
    const CODES: [(&str, i64); 6] = [
        ("eq0", 0x2),
        ("ne0", 0xd),
        ("gt0", 0x1),
        ("lt0", 0xc),
        ("ge0", 0x3),
        ("le0", 0xe),
    ];
    CODES
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| *v)
}

/// Parsing session over one token stream.
///
/// The session owns the enabled feature set; `.requires_88110` widens it for
/// every later statement.
pub struct AsmParser<'a> {
    tokens: &'a [Token<'a>],
    pos: usize,
    matcher: &'a dyn InstructionMatcher,
    features: FeatureBits,
    warnings: Vec<Diagnostic>,
}

impl<'a> AsmParser<'a> {
    /// New session positioned at the first token.
    pub fn new(
        tokens: &'a [Token<'a>],
        matcher: &'a dyn InstructionMatcher,
        features: FeatureBits,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            matcher,
            features,
            warnings: Vec::new(),
        }
    }

    /// Features currently enabled.
    pub fn features(&self) -> FeatureBits {
        self.features
    }

    /// Warnings reported so far.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Take the warnings reported so far.
    pub fn take_warnings(&mut self) -> Vec<Diagnostic> {
        core::mem::take(&mut self.warnings)
    }

    #[inline]
    fn peek(&self) -> &'a Token<'a> {
        let tokens: &'a [Token<'a>] = self.tokens;
        tokens.get(self.pos).or(tokens.last()).unwrap_or(&EOF)
    }

    #[inline]
    fn advance(&mut self) -> &'a Token<'a> {
        let tok = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    #[inline]
    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// Span of the most recently consumed token.
    fn prev_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(self.peek().span, |t| t.span)
    }

    fn at_end(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    fn is_end_of_statement(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn skip_newlines(&mut self) {
        while self.at(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Discard the rest of the current statement.
    pub fn eat_to_end_of_statement(&mut self) {
        while !self.is_end_of_statement() {
            self.advance();
        }
    }

    fn warning(&mut self, message: &str, span: Span) {
        log::warn!("{}: {}", span, message);
        self.warnings.push(Diagnostic::warning(message, span));
    }

    /// Parse every statement, sending results to `out`.
    ///
    /// A statement that fails is skipped up to the end of its line; parsing
    /// resumes with the next one.
    ///
    /// # Errors
    ///
    /// Returns the single error, or [`AsmError::Multiple`] when more than
    /// one statement failed.
    pub fn run(&mut self, out: &mut dyn Streamer) -> Result<(), AsmError> {
        let mut errors = Vec::new();
        loop {
            self.skip_newlines();
            if self.at_end() {
                break;
            }
            if let Err(e) = self.parse_statement(out) {
                log::debug!("statement rejected: {}", e);
                errors.push(e);
                self.eat_to_end_of_statement();
            }
        }
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(AsmError::Multiple { errors }),
        }
    }

    /// Parse one label, directive or instruction.
    ///
    /// # Errors
    ///
    /// Returns the first problem found in the statement.
    pub fn parse_statement(&mut self, out: &mut dyn Streamer) -> Result<(), AsmError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Newline | TokenKind::Eof => Ok(()),
            TokenKind::LabelDef => {
                self.advance();
                out.emit_label(tok.text(), tok.span);
                Ok(())
            }
            TokenKind::Directive => self.parse_directive(out),
            TokenKind::Ident => {
                self.advance();
                let operands = self.parse_instruction(tok.text(), tok.span)?;
                self.match_and_emit(tok.span, &operands, out)
            }
            _ => Err(AsmError::syntax(
                alloc::format!("unexpected token '{}'", tok.text),
                tok.span,
            )),
        }
    }

    /// Handle a target directive. The directive token is the current token.
    ///
    /// # Errors
    ///
    /// Unknown directives and trailing tokens are errors.
    pub fn parse_directive(&mut self, out: &mut dyn Streamer) -> Result<(), AsmError> {
        let tok = self.advance();
        if !tok.text().eq_ignore_ascii_case(".requires_88110") {
            return Err(AsmError::syntax(
                alloc::format!("unknown directive '{}'", tok.text),
                tok.span,
            ));
        }
        if !self.is_end_of_statement() {
            return Err(AsmError::syntax(
                "unexpected token in argument list",
                self.peek().span,
            ));
        }
        self.features |= Cpu::Mc88110.features();
        log::debug!("{}: mc88110 features enabled", tok.span);
        out.emit_directive_requires_88110();
        Ok(())
    }

    /// Parse the operands of an instruction whose mnemonic was just consumed.
    ///
    /// # Errors
    ///
    /// Returns the first operand error, or "unexpected token in argument
    /// list" if the statement does not end after the last operand.
    pub fn parse_instruction(
        &mut self,
        name: &str,
        name_span: Span,
    ) -> Result<OperandVector, AsmError> {
        let mut ops = vec![ParsedOperand::token(name, name_span)];
        if self.is_end_of_statement() {
            return Ok(ops);
        }

        self.expect_operand(&mut ops, name, "expected operand")?;

        if self.at(TokenKind::Comma) {
            self.advance();
            self.expect_operand(&mut ops, name, "expected operand")?;

            if self.at(TokenKind::Comma) {
                self.advance();
                if self.at(TokenKind::Less) && name.eq_ignore_ascii_case("rot") {
                    ops.push(ParsedOperand::token("<", self.peek().span));
                }
                self.expect_operand(&mut ops, name, "expected register or immediate")?;

                if self.at(TokenKind::Less) {
                    ops.push(ParsedOperand::token("<", self.peek().span));
                    self.expect_operand(&mut ops, name, "expected bitfield offset")?;
                }
            } else if self.at(TokenKind::LBrac) {
                if let Err(e) = self.parse_scaled_register(&mut ops) {
                    return Err(e.unwrap_or_else(|| {
                        AsmError::syntax("expected scaled register operand", self.peek().span)
                    }));
                }
            }
        }

        if !self.is_end_of_statement() {
            return Err(AsmError::syntax(
                "unexpected token in argument list",
                self.peek().span,
            ));
        }
        Ok(ops)
    }

    fn expect_operand(
        &mut self,
        ops: &mut OperandVector,
        mnemonic: &str,
        msg: &str,
    ) -> Result<(), AsmError> {
        self.parse_operand(ops, mnemonic)
            .map_err(|e| e.unwrap_or_else(|| AsmError::syntax(msg, self.peek().span)))
    }

    /// Parse one operand and append it to `ops`.
    ///
    /// Custom parsers for the class expected at this position go first.
    /// Otherwise `%` starts a register and anything that can start an
    /// expression becomes an immediate.
    fn parse_operand(
        &mut self,
        ops: &mut OperandVector,
        mnemonic: &str,
    ) -> Result<(), Option<AsmError>> {
        let formal_index = ops.len().saturating_sub(1);
        for parser in self
            .matcher
            .operand_parsers(mnemonic, formal_index, self.features)
        {
            match self.run_custom_parser(parser, ops) {
                ParseStatus::Success(()) => return Ok(()),
                ParseStatus::Failure(e) => return Err(e),
                ParseStatus::NoMatch => {}
            }
        }

        let tok = self.peek();
        match tok.kind {
            TokenKind::Percent if !self.at_relocation_operator() => {
                let r = self.parse_register().map_err(Some)?;
                ops.push(ParsedOperand::register(r.reg, r.start, r.end));
                Ok(())
            }
            TokenKind::Number(_)
            | TokenKind::Ident
            | TokenKind::Directive
            | TokenKind::Percent
            | TokenKind::Minus
            | TokenKind::Tilde
            | TokenKind::LParen => {
                let expr = self.parse_expression().map_err(Some)?;
                ops.push(ParsedOperand::immediate(Some(expr), tok.span, self.prev_span()));
                Ok(())
            }
            _ => Err(None),
        }
    }

    fn run_custom_parser(&mut self, parser: CustomParser, ops: &mut OperandVector) -> ParseStatus {
        match parser {
            CustomParser::BfWidth => self.parse_bf_width(ops),
            CustomParser::BfOffset => self.parse_bf_offset(ops),
            CustomParser::PixelRot => self.parse_pixel_rot(ops),
            CustomParser::ConditionCode => self.parse_condition_code(ops),
            CustomParser::PcRel16 => self.parse_pc_rel(ops, 18),
            CustomParser::PcRel26 => self.parse_pc_rel(ops, 28),
        }
    }

    /// Bitfield width: `w<o>`, `<o>` (width 0) or a bare `o` (width 0).
    ///
    /// A bare integer not followed by `<` is really the offset; the full
    /// `0 < o >` shape is pushed so the matcher sees the usual form.
    fn parse_bf_width(&mut self, ops: &mut OperandVector) -> ParseStatus {
        let start = self.peek().span;
        let mut width = None;
        if let TokenKind::Number(n) = self.peek().kind {
            width = Some(n);
            self.advance();
        }
        let end = if width.is_some() { self.prev_span() } else { start };

        if self.at(TokenKind::Less) {
            ops.push(ParsedOperand::constant(width.unwrap_or(0), start, end));
            return ParseStatus::Success(());
        }
        let Some(offset) = width else {
            return ParseStatus::NoMatch;
        };
        let here = self.peek().span;
        ops.push(ParsedOperand::constant(0, start, end));
        ops.push(ParsedOperand::token("<", here));
        ops.push(ParsedOperand::constant(offset, start, end));
        ops.push(ParsedOperand::token(">", here));
        ParseStatus::Success(())
    }

    /// Bitfield offset `<o>`.
    fn parse_bf_offset(&mut self, ops: &mut OperandVector) -> ParseStatus {
        let start = self.peek().span;
        if !self.at(TokenKind::Less) {
            return ParseStatus::Failure(None);
        }
        self.advance();
        let TokenKind::Number(offset) = self.peek().kind else {
            return ParseStatus::Failure(None);
        };
        self.advance();
        if !self.at(TokenKind::Greater) {
            return ParseStatus::Failure(None);
        }
        let close = self.advance().span;
        ops.push(ParsedOperand::constant(offset, start, close));
        ops.push(ParsedOperand::token(">", close));
        ParseStatus::Success(())
    }

    /// Pixel rotation `<n>`. Low two bits are dropped with a warning.
    fn parse_pixel_rot(&mut self, ops: &mut OperandVector) -> ParseStatus {
        let start = self.peek().span;
        if !self.at(TokenKind::Less) {
            return ParseStatus::NoMatch;
        }
        self.advance();
        let TokenKind::Number(mut amount) = self.peek().kind else {
            return ParseStatus::Failure(None);
        };
        self.advance();
        if !self.at(TokenKind::Greater) {
            return ParseStatus::Failure(None);
        }
        let close = self.advance().span;

        if amount & 0x3 != 0 {
            self.warning("Removed lower 2 bits of expression", start);
            amount &= !0x3;
        }
        ops.push(ParsedOperand::constant(amount, start, close));
        ParseStatus::Success(())
    }

    /// Condition code: a keyword, or an integer too wide for a 5-bit field.
    ///
    /// Integers that already fit 5 bits are left to the generic immediate
    /// path.
    fn parse_condition_code(&mut self, ops: &mut OperandVector) -> ParseStatus {
        let tok = self.peek();
        let code = match tok.kind {
            TokenKind::Number(n) if (0..32).contains(&n) => return ParseStatus::NoMatch,
            TokenKind::Number(n) => n,
            TokenKind::Ident => match condition_code(tok.text()) {
                Some(code) => code,
                None => return ParseStatus::NoMatch,
            },
            _ => return ParseStatus::NoMatch,
        };
        self.advance();
        ops.push(ParsedOperand::constant(code, tok.span, tok.span));
        ParseStatus::Success(())
    }

    /// Branch displacement checked against a signed `bits`-bit byte range.
    ///
    /// Constants, and constant sides of a top-level `+`/`-`, must be even
    /// and in range. Anything symbolic is left for the encoder.
    fn parse_pc_rel(&mut self, ops: &mut OperandVector, bits: u32) -> ParseStatus {
        let save = self.pos;
        let start = self.peek().span;
        let expr = match self.parse_expression() {
            Ok(e) => e,
            Err(_) => {
                self.pos = save;
                return ParseStatus::NoMatch;
            }
        };

        let min = -(1i64 << bits);
        let max = (1i64 << bits) - 1;
        let out_of_range = |e: &Expr| {
            e.as_constant()
                .is_some_and(|v| v & 1 != 0 || v < min || v > max)
        };
        let bad = match &expr {
            Expr::Num(_) => out_of_range(&expr),
            Expr::Add(l, r) | Expr::Sub(l, r) => out_of_range(&**l) || out_of_range(&**r),
            _ => false,
        };
        if bad {
            return ParseStatus::Failure(Some(AsmError::syntax("offset out of range", start)));
        }

        ops.push(ParsedOperand::immediate(Some(expr), start, self.prev_span()));
        ParseStatus::Success(())
    }

    /// `%name`, where name is a primary or alternate register name.
    ///
    /// With `restore_on_failure`, a bad name leaves the `%` unconsumed.
    fn parse_register_with(&mut self, restore_on_failure: bool) -> ParseStatus<RegisterRef> {
        let start = self.peek().span;
        if !self.at(TokenKind::Percent) {
            return ParseStatus::NoMatch;
        }
        let save = self.pos;
        self.advance();

        let name = self.peek();
        let reg = match name.kind {
            TokenKind::Ident => {
                Register::from_name(name.text()).or_else(|| Register::from_alt_name(name.text()))
            }
            _ => None,
        };
        match reg {
            Some(reg) => {
                self.advance();
                ParseStatus::Success(RegisterRef {
                    reg,
                    start,
                    end: name.span,
                })
            }
            None => {
                if restore_on_failure {
                    self.pos = save;
                }
                ParseStatus::Failure(Some(AsmError::syntax("invalid register", start)))
            }
        }
    }

    /// Parse a `%`-prefixed register.
    ///
    /// # Errors
    ///
    /// "invalid register" when there is no `%` or the name is unknown.
    pub fn parse_register(&mut self) -> Result<RegisterRef, AsmError> {
        match self.parse_register_with(false) {
            ParseStatus::Success(r) => Ok(r),
            ParseStatus::NoMatch | ParseStatus::Failure(None) => {
                Err(AsmError::syntax("invalid register", self.peek().span))
            }
            ParseStatus::Failure(Some(e)) => Err(e),
        }
    }

    /// Speculatively parse a register.
    ///
    /// No `%` gives [`ParseStatus::NoMatch`]. A bad name gives
    /// [`ParseStatus::Failure`] with the error suppressed and the cursor
    /// back on the `%`.
    pub fn try_parse_register(&mut self) -> ParseStatus<RegisterRef> {
        match self.parse_register_with(true) {
            ParseStatus::Failure(_) => ParseStatus::Failure(None),
            other => other,
        }
    }

    /// `[%rN]` after a base register. Pushes `[`, the register and `]`.
    fn parse_scaled_register(&mut self, ops: &mut OperandVector) -> Result<(), Option<AsmError>> {
        let open = self.peek().span;
        if !self.at(TokenKind::LBrac) {
            return Err(None);
        }
        self.advance();

        let index = match self.parse_register_with(false) {
            ParseStatus::Success(r) => r,
            ParseStatus::Failure(e) => return Err(e),
            ParseStatus::NoMatch => return Err(None),
        };
        if !self.at(TokenKind::RBrac) {
            return Err(None);
        }
        let close = self.advance().span;

        ops.push(ParsedOperand::token("[", open));
        ops.push(ParsedOperand::register(index.reg, index.start, index.end));
        ops.push(ParsedOperand::token("]", close));
        Ok(())
    }

    /// Match a complete operand list and emit the instruction.
    ///
    /// # Errors
    ///
    /// Reports why no instruction form matched, located at the mnemonic or
    /// the offending operand.
    pub fn match_and_emit(
        &mut self,
        id_span: Span,
        ops: &[ParsedOperand],
        out: &mut dyn Streamer,
    ) -> Result<(), AsmError> {
        match self
            .matcher
            .match_instruction(ops, self.features, &validate_target_operand_class)
        {
            MatchOutcome::Success(mut inst) => {
                inst.span = id_span;
                out.emit_instruction(&inst);
                Ok(())
            }
            MatchOutcome::MissingFeature(missing) => Err(AsmError::MissingFeatures {
                features: missing.names().into_iter().map(String::from).collect(),
                span: id_span,
            }),
            MatchOutcome::InvalidOperand { index, diag } => Err(match (index, diag) {
                (Some(i), diag) if i >= ops.len() => AsmError::TooFewOperands {
                    diag,
                    span: id_span,
                },
                (Some(i), Some(diag)) => AsmError::OperandDiagnostic {
                    diag,
                    span: ops[i].start(),
                },
                (Some(i), None) => AsmError::InvalidOperand {
                    span: ops[i].start(),
                },
                (None, _) => AsmError::InvalidOperand { span: id_span },
            }),
            MatchOutcome::MnemonicFail => {
                let mnemonic = ops.first().and_then(ParsedOperand::token_text).unwrap_or("");
                Err(AsmError::UnknownMnemonic {
                    mnemonic: mnemonic.into(),
                    suggestion: self.matcher.mnemonic_spell_check(mnemonic, self.features),
                    span: id_span,
                })
            }
        }
    }

    // ── Expressions ────────────────────────────────────────

    /// Parse an expression, folding it when it is wholly constant.
    fn parse_expression(&mut self) -> Result<Expr, AsmError> {
        Ok(self.expr_or()?.fold())
    }

    /// Bitwise OR: `a | b`
    fn expr_or(&mut self) -> Result<Expr, AsmError> {
        let mut lhs = self.expr_xor()?;
        while self.at(TokenKind::Pipe) {
            self.advance();
            lhs = Expr::Or(Box::new(lhs), Box::new(self.expr_xor()?));
        }
        Ok(lhs)
    }

    /// Bitwise XOR: `a ^ b`
    fn expr_xor(&mut self) -> Result<Expr, AsmError> {
        let mut lhs = self.expr_and()?;
        while self.at(TokenKind::Caret) {
            self.advance();
            lhs = Expr::Xor(Box::new(lhs), Box::new(self.expr_and()?));
        }
        Ok(lhs)
    }

    /// Bitwise AND: `a & b`
    fn expr_and(&mut self) -> Result<Expr, AsmError> {
        let mut lhs = self.expr_shift()?;
        while self.at(TokenKind::Ampersand) {
            self.advance();
            lhs = Expr::And(Box::new(lhs), Box::new(self.expr_shift()?));
        }
        Ok(lhs)
    }

    /// Shifts: `a << b`, `a >> b`
    fn expr_shift(&mut self) -> Result<Expr, AsmError> {
        let mut lhs = self.expr_add()?;
        loop {
            match self.peek().kind {
                TokenKind::LShift => {
                    self.advance();
                    lhs = Expr::Shl(Box::new(lhs), Box::new(self.expr_add()?));
                }
                TokenKind::RShift => {
                    self.advance();
                    lhs = Expr::Shr(Box::new(lhs), Box::new(self.expr_add()?));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    /// Addition/subtraction: `a + b`, `a - b`
    fn expr_add(&mut self) -> Result<Expr, AsmError> {
        let mut lhs = self.expr_mul()?;
        loop {
            match self.peek().kind {
                TokenKind::Plus => {
                    self.advance();
                    lhs = Expr::Add(Box::new(lhs), Box::new(self.expr_mul()?));
                }
                TokenKind::Minus => {
                    self.advance();
                    lhs = Expr::Sub(Box::new(lhs), Box::new(self.expr_mul()?));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    /// Multiplication/division: `a * b`, `a / b`
    fn expr_mul(&mut self) -> Result<Expr, AsmError> {
        let mut lhs = self.expr_unary()?;
        loop {
            match self.peek().kind {
                TokenKind::Star => {
                    self.advance();
                    lhs = Expr::Mul(Box::new(lhs), Box::new(self.expr_unary()?));
                }
                TokenKind::Slash => {
                    self.advance();
                    lhs = Expr::Div(Box::new(lhs), Box::new(self.expr_unary()?));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    /// Unary operators: `-x`, `~x`
    fn expr_unary(&mut self) -> Result<Expr, AsmError> {
        match self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.expr_unary()?)))
            }
            TokenKind::Tilde => {
                self.advance();
                Ok(Expr::Not(Box::new(self.expr_unary()?)))
            }
            _ => self.expr_atom(),
        }
    }

    /// `%hi16(` or `%lo16(` at the cursor.
    fn at_relocation_operator(&self) -> bool {
        let ahead = |n: usize| self.tokens.get(self.pos + n);
        self.at(TokenKind::Percent)
            && ahead(1).is_some_and(|t| {
                t.kind == TokenKind::Ident && VariantKind::from_name(t.text()).is_some()
            })
            && ahead(2).is_some_and(|t| t.kind == TokenKind::LParen)
    }

    /// Atoms: numbers, symbols (`.L` local names included), `(expr)` and
    /// `%hi16(expr)` / `%lo16(expr)`.
    fn expr_atom(&mut self) -> Result<Expr, AsmError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Num(n))
            }
            TokenKind::Ident | TokenKind::Directive => {
                self.advance();
                Ok(Expr::symbol(tok.text()))
            }
            TokenKind::Percent => {
                self.advance();
                let name = self.peek();
                let kind = match name.kind {
                    TokenKind::Ident => VariantKind::from_name(name.text()),
                    _ => None,
                };
                let Some(kind) = kind else {
                    return Err(AsmError::syntax("expected '%hi16' or '%lo16'", tok.span));
                };
                self.advance();
                if !self.at(TokenKind::LParen) {
                    return Err(AsmError::syntax(
                        "expected '(' after relocation operator",
                        self.peek().span,
                    ));
                }
                self.advance();
                let inner = self.expr_or()?;
                if !self.at(TokenKind::RParen) {
                    return Err(AsmError::syntax("expected ')' in expression", self.peek().span));
                }
                self.advance();
                Ok(Expr::target(kind, inner.fold()))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr_or()?;
                if !self.at(TokenKind::RParen) {
                    return Err(AsmError::syntax("expected ')' in expression", self.peek().span));
                }
                self.advance();
                Ok(inner)
            }
            _ => Err(AsmError::syntax(
                alloc::format!("expected expression, found '{}'", tok.text),
                tok.span,
            )),
        }
    }
}
