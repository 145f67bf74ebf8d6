//! Lowering example: machine instructions from a code generator.
//!
//! Run with: `cargo run --example lowering`

use m88k_asm::{
    Assembler, Cpu, MachineInstr, MachineOperand, MachineOperandKind, Opcode, Register,
    TargetFlags,
};

fn main() {
    let r = Register::gpr;
    let program = [
        // Address of `buffer` into r2.
        MachineInstr::new(Opcode::ORUri)
            .with(MachineOperand::reg(r(2)))
            .with(MachineOperand::reg(r(0)))
            .with(MachineOperand::global("buffer").with_flags(TargetFlags::AbsHi)),
        MachineInstr::new(Opcode::ORri)
            .with(MachineOperand::reg(r(2)))
            .with(MachineOperand::reg(r(2)))
            .with(MachineOperand::global("buffer").with_flags(TargetFlags::AbsLo)),
        // Double-precision add on register pairs.
        MachineInstr::new(Opcode::FADDddd)
            .with(MachineOperand::reg(Register::gpr64(4)))
            .with(MachineOperand::reg(Register::gpr64(6)))
            .with(MachineOperand::reg(Register::gpr64(8))),
        // Call with implicit argument registers and a clobber mask.
        MachineInstr::new(Opcode::BSR)
            .with(MachineOperand::external("memcpy"))
            .with(MachineOperand::implicit_reg(r(2)))
            .with(MachineOperand::new(MachineOperandKind::RegisterMask)),
        MachineInstr::new(Opcode::BR)
            .in_function(1)
            .with(MachineOperand::block(3)),
    ];

    let mut asm = Assembler::new(Cpu::Mc88100);
    for mi in &program {
        if let Err(e) = asm.lower(mi) {
            eprintln!("lowering failed: {}", e);
            return;
        }
    }
    print!("{}", asm.finish().unwrap().to_text());
}
