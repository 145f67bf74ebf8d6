//! Instruction matching.
//!
//! The parser hands a complete [`OperandVector`](crate::operand::OperandVector)
//! to an [`InstructionMatcher`], which picks the descriptor whose operand
//! classes fit and materializes an [`McInst`]. The matcher also tells the
//! parser which custom operand parser, if any, applies at a given operand
//! position, and produces spelling suggestions for unknown mnemonics.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::MatchDiag;
use crate::features::FeatureBits;
use crate::ir::McInst;
use crate::operand::ParsedOperand;
use crate::registers::RegClass;
use crate::table::{InstrDesc, OperandClass, INSTRUCTIONS};

/// Operand parsers selected by operand class rather than by syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomParser {
    /// `w<o>` or a bare offset.
    BfWidth,
    /// `<o>` after a width or after `rot`'s source register.
    BfOffset,
    /// `<n>` pixel rotation.
    PixelRot,
    /// Condition keyword or number.
    ConditionCode,
    /// 16-bit branch displacement.
    PcRel16,
    /// 26-bit branch displacement.
    PcRel26,
}

impl OperandClass {
    /// Custom parser for this class, if it has one.
    pub fn custom_parser(self) -> Option<CustomParser> {
        Some(match self {
            OperandClass::BfWidth => CustomParser::BfWidth,
            OperandClass::BfOffset => CustomParser::BfOffset,
            OperandClass::PixelRot => CustomParser::PixelRot,
            OperandClass::CCode => CustomParser::ConditionCode,
            OperandClass::PcRel16 => CustomParser::PcRel16,
            OperandClass::PcRel26 => CustomParser::PcRel26,
            _ => return None,
        })
    }

    /// Diagnostic reported when an operand fails this class.
    pub fn diagnostic(self) -> Option<MatchDiag> {
        match self {
            OperandClass::BfWidth => Some(MatchDiag::InvalidBitfieldWidth),
            OperandClass::BfOffset => Some(MatchDiag::InvalidBitfieldOffset),
            OperandClass::PixelRot => Some(MatchDiag::InvalidPixelRotationSize),
            _ => None,
        }
    }
}

/// Result of matching one operand list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A descriptor matched.
    Success(McInst),
    /// Operands fit, but the form needs features that are not enabled.
    MissingFeature(FeatureBits),
    /// No form accepted the operands.
    InvalidOperand {
        /// Index into the operand list of the failing operand. `None` when
        /// no operand could be blamed. An index past the end means too few
        /// operands were given.
        index: Option<usize>,
        /// Class-specific diagnostic, when the failing class has one.
        diag: Option<MatchDiag>,
    },
    /// The mnemonic is unknown.
    MnemonicFail,
}

/// Target-specific operand acceptance, consulted after the generic check.
pub type TargetOperandCheck<'a> = &'a dyn Fn(&ParsedOperand, OperandClass) -> bool;

/// Instruction-matching service used by the parser.
pub trait InstructionMatcher {
    /// Match `operands` (mnemonic token first) against the available forms.
    fn match_instruction(
        &self,
        operands: &[ParsedOperand],
        features: FeatureBits,
        target_check: TargetOperandCheck<'_>,
    ) -> MatchOutcome;

    /// Custom parsers to try, in order, for the operand at `formal_index`
    /// (0 = first operand after the mnemonic).
    fn operand_parsers(
        &self,
        mnemonic: &str,
        formal_index: usize,
        features: FeatureBits,
    ) -> Vec<CustomParser>;

    /// Suggestion suffix such as `", did you mean: add, and?"`, or empty.
    fn mnemonic_spell_check(&self, mnemonic: &str, features: FeatureBits) -> String;
}

/// Generic operand-class check: register files and immediate ranges.
pub fn validate_operand_class(op: &ParsedOperand, class: OperandClass) -> bool {
    match class {
        OperandClass::Gpr => op.is_reg_class(RegClass::Gpr),
        OperandClass::Gpr64 => op.is_reg_class(RegClass::Gpr64),
        OperandClass::Xr => op.is_reg_class(RegClass::Xr),
        OperandClass::Cr => op.is_reg_class(RegClass::Cr),
        OperandClass::Fcr => op.is_reg_class(RegClass::Fcr),
        OperandClass::U5Imm => op.is_u5_imm(),
        OperandClass::U16Imm => op.is_u16_imm() || op.is_reloc16(),
        OperandClass::S16Imm => op.is_s16_imm() || op.is_reloc16(),
        OperandClass::Vec9 => op.is_vec9(),
        OperandClass::BfWidth => op.is_bf_width(),
        OperandClass::BfOffset => op.is_bf_offset(),
        OperandClass::PixelRot => op.is_pixel_rot(),
        OperandClass::CCode => op.is_ccode(),
        OperandClass::PcRel16 | OperandClass::PcRel26 => op.is_imm(),
        OperandClass::Literal(text) => op.token_text() == Some(text),
    }
}

enum OperandFailure {
    TooFew {
        index: usize,
        diag: Option<MatchDiag>,
    },
    Mismatch {
        index: usize,
        diag: Option<MatchDiag>,
    },
}

/// Matcher backed by a static descriptor table.
#[derive(Debug, Clone, Copy)]
pub struct TableMatcher {
    table: &'static [InstrDesc],
}

impl Default for TableMatcher {
    fn default() -> Self {
        Self::new(INSTRUCTIONS)
    }
}

impl TableMatcher {
    /// Matcher over `table`.
    pub fn new(table: &'static [InstrDesc]) -> Self {
        Self { table }
    }

    fn forms<'a>(&'a self, mnemonic: &'a str) -> impl Iterator<Item = &'static InstrDesc> + 'a {
        self.table
            .iter()
            .filter(move |d| d.mnemonic.eq_ignore_ascii_case(mnemonic))
    }

    fn check_operands(
        desc: &InstrDesc,
        operands: &[ParsedOperand],
        target_check: TargetOperandCheck<'_>,
    ) -> Result<(), OperandFailure> {
        for (formal, &class) in desc.operands.iter().enumerate() {
            let index = formal + 1;
            let Some(op) = operands.get(index) else {
                return Err(OperandFailure::TooFew {
                    index,
                    diag: class.diagnostic(),
                });
            };
            if !validate_operand_class(op, class) && !target_check(op, class) {
                return Err(OperandFailure::Mismatch {
                    index,
                    diag: class.diagnostic(),
                });
            }
        }
        let extra = desc.operands.len() + 1;
        if operands.len() > extra {
            return Err(OperandFailure::Mismatch {
                index: extra,
                diag: None,
            });
        }
        Ok(())
    }
}

impl InstructionMatcher for TableMatcher {
    fn match_instruction(
        &self,
        operands: &[ParsedOperand],
        features: FeatureBits,
        target_check: TargetOperandCheck<'_>,
    ) -> MatchOutcome {
        let Some(mnemonic) = operands.first().and_then(ParsedOperand::token_text) else {
            return MatchOutcome::MnemonicFail;
        };

        let mut error_index: Option<usize> = None;
        let mut diag: Option<MatchDiag> = None;
        let mut missing: Option<FeatureBits> = None;
        let mut any = false;

        for (i, desc) in self.forms(mnemonic).enumerate() {
            any = true;
            match Self::check_operands(desc, operands, target_check) {
                Ok(()) => {}
                Err(OperandFailure::TooFew { index, diag: d }) => {
                    // The missing operand's own class decides the wording.
                    error_index = Some(index);
                    diag = d;
                    continue;
                }
                Err(OperandFailure::Mismatch { index, diag: d }) => {
                    // The operand that got furthest is the one to blame.
                    if i == 0 || error_index.map_or(true, |e| e <= index) {
                        if d.is_some() || diag.is_none() {
                            diag = d;
                        }
                        error_index = Some(index);
                    }
                    continue;
                }
            }

            let need = desc.features.difference(features);
            if !need.is_empty() {
                if missing.map_or(true, |m| need.bits().count_ones() < m.bits().count_ones()) {
                    missing = Some(need);
                }
                continue;
            }

            let mut inst = McInst::new(desc.opcode);
            inst.span = operands[0].start();
            for op in &operands[1..] {
                op.add_to(&mut inst);
            }
            log::trace!("matched `{}` as {:?}", mnemonic, desc.opcode);
            return MatchOutcome::Success(inst);
        }

        if !any {
            return MatchOutcome::MnemonicFail;
        }
        if let Some(need) = missing {
            return MatchOutcome::MissingFeature(need);
        }
        MatchOutcome::InvalidOperand {
            index: error_index,
            diag,
        }
    }

    fn operand_parsers(
        &self,
        mnemonic: &str,
        formal_index: usize,
        features: FeatureBits,
    ) -> Vec<CustomParser> {
        let mut parsers = Vec::new();
        for desc in self.forms(mnemonic) {
            if !features.contains(desc.features) {
                continue;
            }
            let Some(parser) = desc
                .operands
                .get(formal_index)
                .and_then(|c| c.custom_parser())
            else {
                continue;
            };
            if !parsers.contains(&parser) {
                parsers.push(parser);
            }
        }
        parsers
    }

    fn mnemonic_spell_check(&self, mnemonic: &str, features: FeatureBits) -> String {
        if mnemonic.is_empty() {
            return String::new();
        }
        let lower = mnemonic.to_ascii_lowercase();
        let mut candidates: Vec<&str> = Vec::new();
        for desc in self.table {
            if !features.contains(desc.features) || candidates.contains(&desc.mnemonic) {
                continue;
            }
            if edit_distance(&lower, desc.mnemonic, 2) <= 2 {
                candidates.push(desc.mnemonic);
            }
        }
        let Some((last, rest)) = candidates.split_last() else {
            return String::new();
        };
        let mut out = String::from(", did you mean: ");
        for c in rest {
            out.push_str(c);
            out.push_str(", ");
        }
        out.push_str(last);
        out.push('?');
        out
    }
}

/// Levenshtein distance, giving up once every cell exceeds `max`.
fn edit_distance(a: &str, b: &str, max: usize) -> usize {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len().abs_diff(b.len()) > max {
        return max + 1;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = alloc::vec![0; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        let mut row_min = cur[0];
        for (j, &cb) in b.iter().enumerate() {
            let subst = prev[j] + usize::from(ca != cb);
            cur[j + 1] = subst.min(prev[j + 1] + 1).min(cur[j] + 1);
            row_min = row_min.min(cur[j + 1]);
        }
        if row_min > max {
            return max + 1;
        }
        core::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}
