//! Lowering of register-allocated machine instructions to [`McInst`].
//!
//! Code generation hands over instructions whose operands are already
//! selected and whose registers are physical. [`lower`] keeps the opcode and
//! translates every explicit operand: registers stay registers (pairs become
//! their high half), immediates stay immediates, and symbolic references turn
//! into expressions named through a [`SymbolNamer`]. Implicit register
//! operands and register masks are dropped.
//!
//! The errors returned here are internal-consistency failures; a caller
//! should treat any of them as fatal for the compilation unit.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::ir::{Expr, McInst, McOperand, VariantKind};
use crate::registers::{RegClass, Register, SubRegIndex};
use crate::table::Opcode;

/// Relocation-class marker carried by a symbolic operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetFlags {
    /// Plain reference.
    #[default]
    None,
    /// Upper 16 bits of the absolute address.
    AbsHi,
    /// Lower 16 bits of the absolute address.
    AbsLo,
}

impl TargetFlags {
    fn variant(self) -> Option<VariantKind> {
        match self {
            TargetFlags::None => None,
            TargetFlags::AbsHi => Some(VariantKind::AbsHi),
            TargetFlags::AbsLo => Some(VariantKind::AbsLo),
        }
    }
}

/// Register reference before lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegRef {
    /// A physical register.
    Physical(Register),
    /// A virtual register that escaped allocation.
    Virtual(u32),
}

/// Operand payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MachineOperandKind {
    /// Register use or definition.
    Register {
        /// The register.
        reg: RegRef,
        /// Sub-register index; must be gone by the time of lowering.
        sub_reg: Option<SubRegIndex>,
        /// Implicit operands are not part of the encoding.
        implicit: bool,
    },
    /// Call-clobber register mask.
    RegisterMask,
    /// Integer immediate.
    Immediate(i64),
    /// Basic block of the current function.
    BasicBlock(u32),
    /// Global value by name.
    GlobalAddress(String),
    /// External symbol by name.
    ExternalSymbol(String),
    /// Already-created symbol, used verbatim.
    McSymbol(String),
    /// Jump table of the current function.
    JumpTableIndex(u32),
    /// Constant-pool entry of the current function.
    ConstantPoolIndex(u32),
    /// Address of a basic block taken as a value.
    BlockAddress(u32),
    /// Stack slot; should have been eliminated.
    FrameIndex(i32),
    /// Floating-point immediate, as raw bits.
    FpImmediate(u64),
    /// Debug metadata.
    Metadata,
}

impl MachineOperandKind {
    fn name(&self) -> &'static str {
        match self {
            MachineOperandKind::Register { .. } => "register",
            MachineOperandKind::RegisterMask => "register mask",
            MachineOperandKind::Immediate(_) => "immediate",
            MachineOperandKind::BasicBlock(_) => "basic block",
            MachineOperandKind::GlobalAddress(_) => "global address",
            MachineOperandKind::ExternalSymbol(_) => "external symbol",
            MachineOperandKind::McSymbol(_) => "symbol",
            MachineOperandKind::JumpTableIndex(_) => "jump table index",
            MachineOperandKind::ConstantPoolIndex(_) => "constant pool index",
            MachineOperandKind::BlockAddress(_) => "block address",
            MachineOperandKind::FrameIndex(_) => "frame index",
            MachineOperandKind::FpImmediate(_) => "floating-point immediate",
            MachineOperandKind::Metadata => "metadata",
        }
    }
}

/// One operand of a [`MachineInstr`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MachineOperand {
    /// Payload.
    pub kind: MachineOperandKind,
    /// Relocation-class marker, meaningful for symbolic kinds.
    pub target_flags: TargetFlags,
    /// Byte offset added to symbolic kinds that support one.
    pub offset: i64,
}

impl MachineOperand {
    fn plain(kind: MachineOperandKind) -> Self {
        Self {
            kind,
            target_flags: TargetFlags::None,
            offset: 0,
        }
    }

    /// Explicit physical register.
    pub fn reg(reg: Register) -> Self {
        Self::plain(MachineOperandKind::Register {
            reg: RegRef::Physical(reg),
            sub_reg: None,
            implicit: false,
        })
    }

    /// Implicit physical register.
    pub fn implicit_reg(reg: Register) -> Self {
        Self::plain(MachineOperandKind::Register {
            reg: RegRef::Physical(reg),
            sub_reg: None,
            implicit: true,
        })
    }

    /// Virtual register.
    pub fn vreg(n: u32) -> Self {
        Self::plain(MachineOperandKind::Register {
            reg: RegRef::Virtual(n),
            sub_reg: None,
            implicit: false,
        })
    }

    /// Integer immediate.
    pub fn imm(value: i64) -> Self {
        Self::plain(MachineOperandKind::Immediate(value))
    }

    /// Basic-block reference.
    pub fn block(n: u32) -> Self {
        Self::plain(MachineOperandKind::BasicBlock(n))
    }

    /// Global-address reference.
    pub fn global(name: impl Into<String>) -> Self {
        Self::plain(MachineOperandKind::GlobalAddress(name.into()))
    }

    /// External-symbol reference.
    pub fn external(name: impl Into<String>) -> Self {
        Self::plain(MachineOperandKind::ExternalSymbol(name.into()))
    }

    /// Operand with any other payload.
    pub fn new(kind: MachineOperandKind) -> Self {
        Self::plain(kind)
    }

    /// Set the byte offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the target flags.
    pub fn with_flags(mut self, flags: TargetFlags) -> Self {
        self.target_flags = flags;
        self
    }

    /// Attach a sub-register index. No effect on non-register operands.
    pub fn with_sub_reg(mut self, idx: SubRegIndex) -> Self {
        if let MachineOperandKind::Register { sub_reg, .. } = &mut self.kind {
            *sub_reg = Some(idx);
        }
        self
    }

    /// Implicit register or register mask.
    pub fn is_dropped_by_lowering(&self) -> bool {
        matches!(
            self.kind,
            MachineOperandKind::Register { implicit: true, .. } | MachineOperandKind::RegisterMask
        )
    }
}

/// A selected, register-allocated instruction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MachineInstr {
    /// Selected opcode.
    pub opcode: Opcode,
    /// Operands in instruction order, implicit ones included.
    pub operands: Vec<MachineOperand>,
    /// Number of the enclosing function, used for local symbol names.
    pub function: u32,
}

impl MachineInstr {
    /// Instruction with no operands in function 0.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operands: Vec::new(),
            function: 0,
        }
    }

    /// Builder-style operand append.
    pub fn with(mut self, op: MachineOperand) -> Self {
        self.operands.push(op);
        self
    }

    /// Set the enclosing function number.
    pub fn in_function(mut self, function: u32) -> Self {
        self.function = function;
        self
    }
}

/// Register-file queries needed by lowering.
pub trait RegisterInfo {
    /// The `idx` half of `reg`, if `reg` has one.
    fn sub_register(&self, reg: Register, idx: SubRegIndex) -> Option<Register>;
}

/// The M88k register file.
#[derive(Debug, Clone, Copy, Default)]
pub struct M88kRegisterInfo;

impl RegisterInfo for M88kRegisterInfo {
    fn sub_register(&self, reg: Register, idx: SubRegIndex) -> Option<Register> {
        reg.sub_register(idx)
    }
}

/// Names for symbols that code generation refers to by number.
pub trait SymbolNamer {
    /// Label of basic block `block` in function `function`.
    fn basic_block(&self, function: u32, block: u32) -> String;
    /// Label of jump table `index` in function `function`.
    fn jump_table(&self, function: u32, index: u32) -> String;
    /// Label of constant-pool entry `index` in function `function`.
    fn constant_pool(&self, function: u32, index: u32) -> String;
    /// Temporary label for the address-taken block `id`.
    fn block_address(&self, id: u32) -> String;

    /// Symbol for a global value.
    fn global(&self, name: &str) -> String {
        name.into()
    }

    /// Symbol for an external name.
    fn external_symbol(&self, name: &str) -> String {
        name.into()
    }
}

/// ELF private-label naming (`.L` prefix).
#[derive(Debug, Clone, Copy, Default)]
pub struct ElfSymbolNamer;

impl SymbolNamer for ElfSymbolNamer {
    fn basic_block(&self, function: u32, block: u32) -> String {
        format!(".LBB{}_{}", function, block)
    }

    fn jump_table(&self, function: u32, index: u32) -> String {
        format!(".LJTI{}_{}", function, index)
    }

    fn constant_pool(&self, function: u32, index: u32) -> String {
        format!(".LCPI{}_{}", function, index)
    }

    fn block_address(&self, id: u32) -> String {
        format!(".Ltmp{}", id)
    }
}

/// Fatal lowering failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LowerError {
    /// A virtual register reached lowering.
    VirtualRegister {
        /// Operand position.
        index: usize,
        /// Virtual register number.
        vreg: u32,
    },
    /// A register operand still carries a sub-register index.
    SubRegisterNotEliminated {
        /// Operand position.
        index: usize,
    },
    /// The register file has no high half for a pair.
    MissingSubRegister {
        /// Operand position.
        index: usize,
        /// The pair.
        reg: Register,
    },
    /// An operand kind that cannot appear in an encoded instruction.
    UnexpectedOperand {
        /// Operand position.
        index: usize,
        /// Operand kind.
        kind: &'static str,
    },
    /// The assembler already holds its maximum number of instructions.
    InstructionLimit {
        /// The configured limit.
        limit: usize,
    },
}

impl fmt::Display for LowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LowerError::VirtualRegister { index, vreg } => {
                write!(f, "operand {}: virtual register %{} was not allocated", index, vreg)
            }
            LowerError::SubRegisterNotEliminated { index } => {
                write!(f, "operand {}: subregs should be eliminated", index)
            }
            LowerError::MissingSubRegister { index, reg } => {
                write!(f, "operand {}: register {} has no high half", index, reg)
            }
            LowerError::UnexpectedOperand { index, kind } => {
                write!(f, "operand {}: unexpected machine operand type ({})", index, kind)
            }
            LowerError::InstructionLimit { limit } => {
                write!(f, "resource limit exceeded: instructions (limit: {})", limit)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LowerError {}

/// Lower one machine instruction.
///
/// # Errors
///
/// Any [`LowerError`]; each one means the instruction stream is malformed.
pub fn lower(
    instr: &MachineInstr,
    regs: &dyn RegisterInfo,
    namer: &dyn SymbolNamer,
) -> Result<McInst, LowerError> {
    let mut out = McInst::new(instr.opcode);
    for (index, op) in instr.operands.iter().enumerate() {
        if op.is_dropped_by_lowering() {
            continue;
        }
        out.push(lower_operand(index, op, instr.function, regs, namer)?);
    }
    log::trace!("lowered {:?} with {} operands", instr.opcode, out.operands.len());
    Ok(out)
}

fn lower_operand(
    index: usize,
    op: &MachineOperand,
    function: u32,
    regs: &dyn RegisterInfo,
    namer: &dyn SymbolNamer,
) -> Result<McOperand, LowerError> {
    let symbol = |name: String, has_offset: bool| {
        let mut expr = Expr::Symbol(name);
        if has_offset && op.offset != 0 {
            expr = Expr::add(expr, Expr::Num(op.offset));
        }
        if let Some(kind) = op.target_flags.variant() {
            expr = Expr::target(kind, expr);
        }
        McOperand::Expr(expr)
    };

    Ok(match &op.kind {
        MachineOperandKind::Register { reg, sub_reg, .. } => {
            let reg = match *reg {
                RegRef::Physical(r) => r,
                RegRef::Virtual(vreg) => return Err(LowerError::VirtualRegister { index, vreg }),
            };
            if sub_reg.is_some() {
                return Err(LowerError::SubRegisterNotEliminated { index });
            }
            if reg.class() == RegClass::Gpr64 {
                let hi = regs
                    .sub_register(reg, SubRegIndex::Hi)
                    .ok_or(LowerError::MissingSubRegister { index, reg })?;
                McOperand::Reg(hi)
            } else {
                McOperand::Reg(reg)
            }
        }
        MachineOperandKind::Immediate(v) => McOperand::Imm(*v),
        MachineOperandKind::BasicBlock(b) => symbol(namer.basic_block(function, *b), false),
        MachineOperandKind::GlobalAddress(name) => symbol(namer.global(name), true),
        MachineOperandKind::ExternalSymbol(name) => symbol(namer.external_symbol(name), true),
        MachineOperandKind::McSymbol(name) => symbol(name.clone(), true),
        MachineOperandKind::JumpTableIndex(i) => symbol(namer.jump_table(function, *i), false),
        MachineOperandKind::ConstantPoolIndex(i) => {
            symbol(namer.constant_pool(function, *i), true)
        }
        MachineOperandKind::BlockAddress(id) => symbol(namer.block_address(*id), true),
        other => {
            return Err(LowerError::UnexpectedOperand {
                index,
                kind: other.name(),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn lower_one(op: MachineOperand) -> Result<McOperand, LowerError> {
        let mi = MachineInstr::new(Opcode::ORUri).in_function(3).with(op);
        let inst = lower(&mi, &M88kRegisterInfo, &ElfSymbolNamer)?;
        assert_eq!(inst.operands.len(), 1);
        Ok(inst.operands[0].clone())
    }

    #[test]
    fn registers_and_immediates() {
        let mi = MachineInstr::new(Opcode::ADDUri)
            .with(MachineOperand::reg(Register::gpr(2)))
            .with(MachineOperand::reg(Register::gpr(3)))
            .with(MachineOperand::imm(-7));
        let inst = lower(&mi, &M88kRegisterInfo, &ElfSymbolNamer).unwrap();
        assert_eq!(inst.opcode, Opcode::ADDUri);
        assert_eq!(
            inst.operands,
            [
                McOperand::Reg(Register::gpr(2)),
                McOperand::Reg(Register::gpr(3)),
                McOperand::Imm(-7),
            ]
        );
    }

    #[test]
    fn pairs_lower_to_high_half() {
        assert_eq!(
            lower_one(MachineOperand::reg(Register::gpr64(6))),
            Ok(McOperand::Reg(Register::gpr(6)))
        );
    }

    #[test]
    fn implicit_operands_and_masks_dropped() {
        let mi = MachineInstr::new(Opcode::JSR)
            .with(MachineOperand::reg(Register::gpr(1)))
            .with(MachineOperand::implicit_reg(Register::gpr(2)))
            .with(MachineOperand::new(MachineOperandKind::RegisterMask));
        let inst = lower(&mi, &M88kRegisterInfo, &ElfSymbolNamer).unwrap();
        assert_eq!(inst.operands, [McOperand::Reg(Register::gpr(1))]);
    }

    #[test]
    fn symbol_offsets_and_flags() {
        assert_eq!(
            lower_one(MachineOperand::global("g").with_offset(8).with_flags(TargetFlags::AbsHi)),
            Ok(McOperand::Expr(Expr::target(
                VariantKind::AbsHi,
                Expr::add(Expr::symbol("g"), Expr::Num(8))
            )))
        );
        assert_eq!(
            lower_one(MachineOperand::external("memcpy")),
            Ok(McOperand::Expr(Expr::symbol("memcpy")))
        );
        assert_eq!(
            lower_one(MachineOperand::global("g").with_flags(TargetFlags::AbsLo))
                .unwrap()
                .to_string(),
            "%lo16(g)"
        );
    }

    #[test]
    fn blocks_and_jump_tables_ignore_offsets() {
        assert_eq!(
            lower_one(MachineOperand::block(4).with_offset(12)),
            Ok(McOperand::Expr(Expr::symbol(".LBB3_4")))
        );
        assert_eq!(
            lower_one(MachineOperand::new(MachineOperandKind::JumpTableIndex(1)).with_offset(4)),
            Ok(McOperand::Expr(Expr::symbol(".LJTI3_1")))
        );
        assert_eq!(
            lower_one(MachineOperand::new(MachineOperandKind::ConstantPoolIndex(0)).with_offset(4)),
            Ok(McOperand::Expr(Expr::add(Expr::symbol(".LCPI3_0"), Expr::Num(4))))
        );
        assert_eq!(
            lower_one(MachineOperand::new(MachineOperandKind::BlockAddress(9))),
            Ok(McOperand::Expr(Expr::symbol(".Ltmp9")))
        );
        assert_eq!(
            lower_one(MachineOperand::new(MachineOperandKind::McSymbol("sym".into())).with_offset(-2)),
            Ok(McOperand::Expr(Expr::add(Expr::symbol("sym"), Expr::Num(-2))))
        );
    }

    #[test]
    fn fatal_operands() {
        assert_eq!(
            lower_one(MachineOperand::vreg(5)),
            Err(LowerError::VirtualRegister { index: 0, vreg: 5 })
        );
        assert_eq!(
            lower_one(MachineOperand::reg(Register::gpr64(2)).with_sub_reg(SubRegIndex::Lo)),
            Err(LowerError::SubRegisterNotEliminated { index: 0 })
        );
        let err = lower_one(MachineOperand::new(MachineOperandKind::FrameIndex(1))).unwrap_err();
        assert_eq!(err.to_string(), "operand 0: unexpected machine operand type (frame index)");
        assert!(lower_one(MachineOperand::new(MachineOperandKind::Metadata)).is_err());
    }

    struct NoPairs;

    impl RegisterInfo for NoPairs {
        fn sub_register(&self, _: Register, _: SubRegIndex) -> Option<Register> {
            None
        }
    }

    #[test]
    fn register_info_is_consulted() {
        let mi = MachineInstr::new(Opcode::FADDddd).with(MachineOperand::reg(Register::gpr64(4)));
        assert_eq!(
            lower(&mi, &NoPairs, &ElfSymbolNamer),
            Err(LowerError::MissingSubRegister {
                index: 0,
                reg: Register::gpr64(4)
            })
        );
    }
}
