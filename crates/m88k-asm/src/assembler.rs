//! Public assembler API: builder pattern and one-shot assembly.
//!
//! This module ties the lexer, parser and matcher together, and also
//! accepts already-selected machine instructions through the lowerer, so
//! both paths end up in the same instruction stream.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{AsmError, Diagnostic, Span};
use crate::features::{Cpu, FeatureBits};
use crate::ir::McInst;
use crate::lexer;
use crate::lower::{self, ElfSymbolNamer, LowerError, M88kRegisterInfo, MachineInstr};
use crate::lower::{RegisterInfo, SymbolNamer};
use crate::matcher::TableMatcher;
use crate::parser::AsmParser;
use crate::streamer::{format_instruction, Label, RecordingStreamer, Streamer, TextStreamer};
use crate::table::InstrDesc;

/// Size of every M88k instruction word, used for listing addresses.
const INSTRUCTION_BYTES: u64 = 4;

/// The result of a successful assembly operation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[must_use]
pub struct AssemblyResult {
    instructions: Vec<McInst>,
    labels: Vec<Label>,
    diagnostics: Vec<Diagnostic>,
    features: FeatureBits,
    requires_88110: bool,
}

impl AssemblyResult {
    /// Instructions in emission order.
    ///
    /// # Examples
    ///
    /// ```
    /// use m88k_asm::{Assembler, Cpu, Opcode};
    ///
    /// let mut asm = Assembler::new(Cpu::Mc88100);
    /// asm.emit("addu %r1, %r2, 4")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.instructions()[0].opcode, Opcode::ADDUri);
    /// # Ok::<(), m88k_asm::AsmError>(())
    /// ```
    #[must_use]
    pub fn instructions(&self) -> &[McInst] {
        &self.instructions
    }

    /// Consume and return the instructions.
    #[must_use]
    pub fn into_instructions(self) -> Vec<McInst> {
        self.instructions
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether no instruction was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Labels in definition order.
    #[must_use]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Index of the instruction following `name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use m88k_asm::{Assembler, Cpu};
    ///
    /// let mut asm = Assembler::new(Cpu::Mc88100);
    /// asm.emit("start: jmp %r1\nend:")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.label_index("start"), Some(0));
    /// assert_eq!(result.label_index("end"), Some(1));
    /// assert_eq!(result.label_index("missing"), None);
    /// # Ok::<(), m88k_asm::AsmError>(())
    /// ```
    #[must_use]
    pub fn label_index(&self, name: &str) -> Option<usize> {
        self.labels.iter().find(|l| l.name == name).map(|l| l.index)
    }

    /// Warnings reported while parsing.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Features enabled at the end of the input.
    #[must_use]
    pub fn features(&self) -> FeatureBits {
        self.features
    }

    /// Whether the input contained `.requires_88110`.
    #[must_use]
    pub fn requires_88110(&self) -> bool {
        self.requires_88110
    }

    /// Re-emit everything as assembly text.
    ///
    /// The output parses back to the same instructions. For lowered code
    /// this holds as long as symbolic 16-bit immediates carry an `AbsHi` or
    /// `AbsLo` flag, since a bare symbol is not a 16-bit immediate.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = TextStreamer::new();
        self.replay(&mut out);
        out.into_string()
    }

    /// Feed the result to another streamer, labels interleaved at their
    /// positions.
    pub fn replay(&self, out: &mut dyn Streamer) {
        if self.requires_88110 {
            out.emit_directive_requires_88110();
        }
        let mut labels = self.labels.iter().peekable();
        for (i, inst) in self.instructions.iter().enumerate() {
            while let Some(l) = labels.next_if(|l| l.index <= i) {
                out.emit_label(&l.name, l.span);
            }
            out.emit_instruction(inst);
        }
        for l in labels {
            out.emit_label(&l.name, l.span);
        }
    }

    /// Human-readable listing with word addresses.
    ///
    /// ```text
    /// 00000000          entry:
    /// 00000000  addu    %r1, %r2, 4
    /// 00000004  jmp     %r1
    /// ```
    #[must_use]
    pub fn listing(&self) -> String {
        use core::fmt::Write;

        let mut out = String::new();
        let mut labels = self.labels.iter().peekable();
        let mut addr = 0u64;
        for (i, inst) in self.instructions.iter().enumerate() {
            while let Some(l) = labels.next_if(|l| l.index <= i) {
                let _ = writeln!(out, "{:08X}          {}:", addr, l.name);
            }
            let text = format_instruction(inst);
            let mut parts = text.trim_start().splitn(2, '\t');
            let mnemonic = parts.next().unwrap_or("");
            match parts.next() {
                Some(ops) => {
                    let _ = writeln!(out, "{:08X}  {:<8}{}", addr, mnemonic, ops);
                }
                None => {
                    let _ = writeln!(out, "{:08X}  {}", addr, mnemonic);
                }
            }
            addr += INSTRUCTION_BYTES;
        }
        for l in labels {
            let _ = writeln!(out, "{:08X}          {}:", addr, l.name);
        }
        out
    }
}

/// Configurable resource limits for untrusted input.
///
/// # Examples
///
/// ```rust
/// use m88k_asm::{Assembler, Cpu};
/// use m88k_asm::assembler::ResourceLimits;
///
/// let mut asm = Assembler::new(Cpu::Mc88100);
/// asm.limits(ResourceLimits {
///     max_source_bytes: 16,
///     max_instructions: 1_000,
/// });
/// assert!(asm.emit("addu %r1, %r2, %r3 ; far too long").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceLimits {
    /// Maximum input bytes per `emit()` call. Default: 64 MiB.
    pub max_source_bytes: usize,
    /// Maximum instructions held by one assembler. Default: 1,000,000.
    pub max_instructions: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_source_bytes: 64 * 1024 * 1024,
            max_instructions: 1_000_000,
        }
    }
}

/// Builder-pattern assembler.
///
/// The enabled feature set starts from the CPU preset and is widened by
/// `.requires_88110`; the widening carries over to later `emit` calls.
///
/// # Examples
///
/// ```rust
/// use m88k_asm::{Assembler, Cpu};
///
/// let mut asm = Assembler::new(Cpu::Mc88100);
/// asm.emit("loop: subu %r2, %r2, 1").unwrap();
/// asm.emit("bcnd ne0, %r2, loop").unwrap();
/// let result = asm.finish().unwrap();
/// assert_eq!(result.len(), 2);
/// ```
#[derive(Debug)]
pub struct Assembler {
    cpu: Cpu,
    features: FeatureBits,
    matcher: TableMatcher,
    out: RecordingStreamer,
    diagnostics: Vec<Diagnostic>,
    /// Errors from earlier `emit` calls, reported again by `finish`.
    errors: Vec<AsmError>,
    limits: ResourceLimits,
}

impl Assembler {
    /// Create an assembler with the feature preset of `cpu`.
    pub fn new(cpu: Cpu) -> Self {
        Self {
            cpu,
            features: cpu.features(),
            matcher: TableMatcher::default(),
            out: RecordingStreamer::default(),
            diagnostics: Vec::new(),
            errors: Vec::new(),
            limits: ResourceLimits::default(),
        }
    }

    /// The CPU this assembler was created for.
    pub fn cpu(&self) -> Cpu {
        self.cpu
    }

    /// Features currently enabled.
    pub fn enabled_features(&self) -> FeatureBits {
        self.features
    }

    /// Replace the enabled feature set.
    pub fn features(&mut self, features: FeatureBits) -> &mut Self {
        self.features = features;
        self
    }

    /// Match against a different instruction table.
    ///
    /// Every entry must keep the operand layout of its opcode in
    /// [`INSTRUCTIONS`](crate::table::INSTRUCTIONS): text output and
    /// listings print through [`Opcode::desc`](crate::table::Opcode::desc),
    /// not through the custom table. Restricting or reordering forms is
    /// fine.
    pub fn table(&mut self, table: &'static [InstrDesc]) -> &mut Self {
        self.matcher = TableMatcher::new(table);
        self
    }

    /// Set resource limits.
    pub fn limits(&mut self, limits: ResourceLimits) -> &mut Self {
        self.limits = limits;
        self
    }

    /// Parse and match assembly source text.
    ///
    /// Every statement is attempted; statements that parse are kept even
    /// when others fail.
    ///
    /// # Errors
    ///
    /// Returns the error(s) of the failing statements, a lexer error, or
    /// [`AsmError::ResourceLimitExceeded`]. Instructions past the limit are
    /// discarded. The same errors are reported again by [`Assembler::finish`].
    pub fn emit(&mut self, source: &str) -> Result<&mut Self, AsmError> {
        if source.len() > self.limits.max_source_bytes {
            let e = AsmError::ResourceLimitExceeded {
                resource: String::from("source bytes"),
                limit: self.limits.max_source_bytes,
            };
            self.errors.push(e.clone());
            return Err(e);
        }
        let tokens = match lexer::tokenize(source) {
            Ok(t) => t,
            Err(e) => {
                self.errors.push(e.clone());
                return Err(e);
            }
        };

        let mut parser = AsmParser::new(&tokens, &self.matcher, self.features);
        let result = parser.run(&mut self.out);
        self.features = parser.features();
        self.diagnostics.extend(parser.take_warnings());

        if let Err(e) = &result {
            self.errors.push(e.clone());
        }
        if let Err(e) = self.enforce_instruction_limit() {
            self.errors.push(e.clone());
            return Err(e);
        }
        result?;
        Ok(self)
    }

    /// Parse a single instruction without touching the assembler's state.
    ///
    /// # Errors
    ///
    /// Returns the parse or match error, or a syntax error if the source
    /// holds anything but exactly one instruction.
    pub fn parse_one(&self, source: &str) -> Result<McInst, AsmError> {
        let tokens = lexer::tokenize(source)?;
        let mut out = RecordingStreamer::default();
        AsmParser::new(&tokens, &self.matcher, self.features).run(&mut out)?;
        match out.instructions.len() {
            1 => Ok(out.instructions.remove(0)),
            _ => Err(AsmError::syntax(
                "expected exactly one instruction",
                Span::new(1, 1, 0, source.len()),
            )),
        }
    }

    /// Define a label at the current position.
    pub fn label(&mut self, name: &str) -> &mut Self {
        self.out.emit_label(name, Span::dummy());
        self
    }

    /// Lower a machine instruction and append it.
    ///
    /// Uses the M88k register file and ELF local-symbol names.
    ///
    /// # Errors
    ///
    /// Returns the [`LowerError`]; nothing is appended in that case.
    pub fn lower(&mut self, instr: &MachineInstr) -> Result<&mut Self, LowerError> {
        self.lower_with(instr, &M88kRegisterInfo, &ElfSymbolNamer)
    }

    /// Lower a machine instruction with a custom register file and namer.
    ///
    /// # Errors
    ///
    /// Returns the [`LowerError`]; nothing is appended in that case.
    /// [`LowerError::InstructionLimit`] when the assembler already holds
    /// [`ResourceLimits::max_instructions`] instructions.
    pub fn lower_with(
        &mut self,
        instr: &MachineInstr,
        regs: &dyn RegisterInfo,
        namer: &dyn SymbolNamer,
    ) -> Result<&mut Self, LowerError> {
        let limit = self.limits.max_instructions;
        if self.out.instructions.len() >= limit {
            return Err(LowerError::InstructionLimit { limit });
        }
        let inst = lower::lower(instr, regs, namer)?;
        self.out.emit_instruction(&inst);
        Ok(self)
    }

    /// Instructions emitted so far.
    pub fn instruction_count(&self) -> usize {
        self.out.instructions.len()
    }

    /// Discard everything emitted so far. Configuration is kept and the
    /// feature set goes back to the CPU preset.
    pub fn reset(&mut self) -> &mut Self {
        self.out = RecordingStreamer::default();
        self.diagnostics.clear();
        self.errors.clear();
        self.features = self.cpu.features();
        self
    }

    /// Drop instructions past the limit and report the breach.
    fn enforce_instruction_limit(&mut self) -> Result<(), AsmError> {
        let limit = self.limits.max_instructions;
        if self.out.instructions.len() <= limit {
            return Ok(());
        }
        self.out.instructions.truncate(limit);
        for l in &mut self.out.labels {
            l.index = l.index.min(limit);
        }
        Err(AsmError::ResourceLimitExceeded {
            resource: String::from("instructions"),
            limit,
        })
    }

    /// Finish and return everything emitted.
    ///
    /// # Errors
    ///
    /// Returns the errors recorded by earlier `emit` calls.
    pub fn finish(mut self) -> Result<AssemblyResult, AsmError> {
        match self.errors.len() {
            0 => {}
            1 => return Err(self.errors.remove(0)),
            _ => {
                let errors = self.errors.into_iter().flat_map(AsmError::into_errors).collect();
                return Err(AsmError::Multiple { errors });
            }
        }
        Ok(AssemblyResult {
            instructions: self.out.instructions,
            labels: self.out.labels,
            diagnostics: self.diagnostics,
            features: self.features,
            requires_88110: self.out.requires_88110,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Expr, McOperand};
    use crate::lower::MachineOperand;
    use crate::registers::Register;
    use crate::table::{Opcode, OperandClass};

    #[test]
    fn builder_accumulates_across_emits() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        asm.emit("or %r2, %r0, 1").unwrap();
        asm.emit("jmp %r1").unwrap();
        let result = asm.finish().unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.instructions()[1].opcode, Opcode::JMP);
    }

    #[test]
    fn directive_carries_over_emit_calls() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        assert!(asm.emit("padd %r2, %r4, %r6").is_err());
        asm.reset();
        asm.emit(".requires_88110").unwrap();
        asm.emit("padd %r2, %r4, %r6").unwrap();
        let result = asm.finish().unwrap();
        assert!(result.requires_88110());
        assert!(result.features().contains(FeatureBits::GRAPHICS));
    }

    #[test]
    fn explicit_features_override_preset() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        asm.features(FeatureBits::MC88110);
        asm.emit("muls %r2, %r3, %r4").unwrap();
        assert_eq!(asm.enabled_features(), FeatureBits::MC88110);
    }

    #[test]
    fn errors_resurface_in_finish() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        assert!(asm.emit("addu %r1").is_err());
        assert!(asm.emit("bogus").is_err());
        let errors = asm.finish().unwrap_err().into_errors();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn good_statements_survive_a_bad_one() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        assert!(asm.emit("jmp %r1\naddu %r1\njmp %r2").is_err());
        assert_eq!(asm.instruction_count(), 2);
    }

    #[test]
    fn warnings_are_kept() {
        let mut asm = Assembler::new(Cpu::Mc88110);
        asm.emit("prot %r2, %r4, <6>").unwrap();
        let result = asm.finish().unwrap();
        assert_eq!(result.diagnostics().len(), 1);
        assert_eq!(result.diagnostics()[0].span.col, 16);
    }

    #[test]
    fn source_limit() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        asm.limits(ResourceLimits {
            max_source_bytes: 4,
            ..ResourceLimits::default()
        });
        assert!(matches!(
            asm.emit("jmp %r1"),
            Err(AsmError::ResourceLimitExceeded { .. })
        ));
        assert!(asm.finish().is_err());
    }

    #[test]
    fn instruction_limit() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        asm.limits(ResourceLimits {
            max_instructions: 1,
            ..ResourceLimits::default()
        });
        asm.emit("jmp %r1").unwrap();
        assert!(asm.emit("jmp %r1").is_err());
    }

    #[test]
    fn instruction_limit_fails_finish() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        asm.limits(ResourceLimits {
            max_instructions: 1,
            ..ResourceLimits::default()
        });
        let err = asm.emit("jmp %r1\nend: jmp %r2").unwrap_err();
        assert_eq!(
            err,
            AsmError::ResourceLimitExceeded {
                resource: String::from("instructions"),
                limit: 1
            }
        );
        assert_eq!(asm.instruction_count(), 1);
        assert!(matches!(
            asm.finish(),
            Err(AsmError::ResourceLimitExceeded { limit: 1, .. })
        ));
    }

    #[test]
    fn lowering_respects_instruction_limit() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        asm.limits(ResourceLimits {
            max_instructions: 1,
            ..ResourceLimits::default()
        });
        let jmp = MachineInstr::new(Opcode::JMP).with(MachineOperand::reg(Register::gpr(1)));
        asm.lower(&jmp).unwrap();
        assert_eq!(
            asm.lower(&jmp).unwrap_err(),
            LowerError::InstructionLimit { limit: 1 }
        );
        assert_eq!(asm.finish().unwrap().len(), 1);
    }

    #[test]
    fn restricted_table_prints_like_the_builtin_one() {
        static BRANCHES: [InstrDesc; 2] = [
            InstrDesc {
                opcode: Opcode::BR,
                mnemonic: "br",
                operands: &[OperandClass::PcRel26],
                features: FeatureBits::empty(),
            },
            InstrDesc {
                opcode: Opcode::JMP,
                mnemonic: "jmp",
                operands: &[OperandClass::Gpr],
                features: FeatureBits::empty(),
            },
        ];
        let mut asm = Assembler::new(Cpu::Mc88100);
        asm.table(&BRANCHES);
        assert!(asm.emit("addu %r1, %r2, %r3").is_err());
        asm.reset();
        asm.emit("top: br top\njmp %r1").unwrap();
        let text = asm.finish().unwrap().to_text();
        assert_eq!(text, "top:\n\tbr\ttop\n\tjmp\t%r1\n");
    }

    #[test]
    fn parse_one_is_stateless() {
        let asm = Assembler::new(Cpu::Mc88100);
        let inst = asm.parse_one("ld %r1, %r2[%r3]").unwrap();
        assert_eq!(inst.opcode, Opcode::LDrrs);
        assert!(asm.parse_one("jmp %r1\njmp %r2").is_err());
        assert!(asm.parse_one("").is_err());
        assert_eq!(asm.instruction_count(), 0);
    }

    #[test]
    fn lowered_instructions_join_the_stream() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        asm.emit("entry:").unwrap();
        let mi = MachineInstr::new(Opcode::BR).in_function(1).with(MachineOperand::block(2));
        asm.lower(&mi).unwrap();
        assert!(asm.lower(&MachineInstr::new(Opcode::JMP).with(MachineOperand::vreg(1))).is_err());
        let result = asm.finish().unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.instructions()[0].operands,
            [McOperand::Expr(Expr::symbol(".LBB1_2"))]
        );
        assert_eq!(result.label_index("entry"), Some(0));
    }

    #[test]
    fn text_and_listing() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        asm.emit(".requires_88110\nentry: addu %r1, %r2, 4\njmp %r1\ndone:").unwrap();
        let result = asm.finish().unwrap();
        assert_eq!(
            result.to_text(),
            "\t.requires_88110\nentry:\n\taddu\t%r1, %r2, 4\n\tjmp\t%r1\ndone:\n"
        );
        assert_eq!(
            result.listing(),
            "00000000          entry:\n\
             00000000  addu    %r1, %r2, 4\n\
             00000004  jmp     %r1\n\
             00000008          done:\n"
        );
    }

    #[test]
    fn manual_label() {
        let mut asm = Assembler::new(Cpu::Mc88100);
        asm.emit("jmp %r1").unwrap();
        asm.label("after");
        let result = asm.finish().unwrap();
        assert_eq!(result.label_index("after"), Some(1));
        assert_eq!(result.instructions()[0].operands[0], McOperand::Reg(Register::gpr(1)));
    }
}
