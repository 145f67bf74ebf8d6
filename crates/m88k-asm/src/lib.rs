//! # m88k-asm: Motorola 88000 assembly parsing and instruction lowering
//!
//! `m88k-asm` turns M88k assembly text into abstract machine instructions
//! ([`McInst`]) and lowers register-allocated machine instructions from a
//! code generator into the same form.
//!
//! ## Quick Start
//!
//! ```rust
//! use m88k_asm::{assemble, Opcode};
//!
//! let result = assemble("ext %r1, %r2, 5<3>").unwrap();
//! assert_eq!(result.instructions()[0].opcode, Opcode::EXTbf);
//! ```
//!
//! ## Features
//!
//! - **Operand sugar**: bitfields `w<o>`, rotate `<o>`, scaled index
//!   `rS1[rS2]`, condition keywords (`eq0`, `ne0`, ...), pixel rotation.
//! - **Feature gating**: 88110-only forms need the 88110 preset or a
//!   `.requires_88110` directive.
//! - **Diagnostics**: every bad statement is reported with its location;
//!   unknown mnemonics come with spelling suggestions.
//! - **`no_std` + `alloc`**: the `std` feature only adds `std::error::Error`.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// Register numbers and immediates move between integer widths constantly,
// and the instruction table is dense by nature.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::redundant_closure_for_method_calls,
    clippy::wildcard_imports,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::too_many_lines,
    clippy::missing_errors_doc,
    clippy::return_self_not_must_use
)]

extern crate alloc;

/// Public assembler API: builder pattern, one-shot assembly, `AssemblyResult`.
pub mod assembler;
/// Error types and source-span diagnostics.
pub mod error;
/// CPU models and feature bits.
pub mod features;
/// Abstract instructions and expressions.
pub mod ir;
/// Tokenizer with span tracking.
pub mod lexer;
/// Lowering of machine instructions to abstract instructions.
pub mod lower;
/// Operand matching against the instruction table.
pub mod matcher;
/// Parsed operand model.
pub mod operand;
/// Statement and operand parser.
pub mod parser;
/// Register file.
pub mod registers;
/// Output sinks.
pub mod streamer;
/// Instruction descriptors and opcodes.
pub mod table;

// Re-exports
pub use assembler::{Assembler, AssemblyResult, ResourceLimits};
pub use error::{AsmError, Diagnostic, MatchDiag, Severity, Span};
pub use features::{Cpu, FeatureBits};
pub use ir::{Expr, McInst, McOperand, VariantKind};
pub use lower::{
    lower, ElfSymbolNamer, LowerError, M88kRegisterInfo, MachineInstr, MachineOperand,
    MachineOperandKind, RegRef, RegisterInfo, SymbolNamer, TargetFlags,
};
pub use matcher::{InstructionMatcher, MatchOutcome, TableMatcher};
pub use operand::{OperandVector, ParsedOperand};
pub use parser::{AsmParser, ParseStatus, RegisterRef};
pub use registers::{InvalidRegisterId, RegClass, Register, SubRegIndex};
pub use streamer::{Label, RecordingStreamer, Streamer, TextStreamer};
pub use table::{InstrDesc, OperandClass, Opcode, INSTRUCTIONS};

/// Assemble source text for the MC88100.
///
/// # Errors
///
/// Returns [`AsmError`] for lexer errors or for any statement that fails to
/// parse or match; with several failures the error is
/// [`AsmError::Multiple`].
///
/// # Examples
///
/// ```rust
/// use m88k_asm::assemble;
///
/// let result = assemble("addu %r1, %r2, %r3\njmp %r1").unwrap();
/// assert_eq!(result.len(), 2);
/// assert!(assemble("padd %r2, %r4, %r6").is_err());
/// ```
pub fn assemble(source: &str) -> Result<AssemblyResult, AsmError> {
    assemble_for(source, Cpu::Mc88100)
}

/// Assemble source text for the given CPU.
///
/// # Errors
///
/// See [`assemble`].
///
/// # Examples
///
/// ```rust
/// use m88k_asm::{assemble_for, Cpu};
///
/// let result = assemble_for("padd %r2, %r4, %r6", Cpu::Mc88110).unwrap();
/// assert_eq!(result.len(), 1);
/// ```
pub fn assemble_for(source: &str, cpu: Cpu) -> Result<AssemblyResult, AsmError> {
    let mut asm = Assembler::new(cpu);
    asm.emit(source)?;
    asm.finish()
}
