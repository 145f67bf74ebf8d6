#![cfg(not(target_arch = "wasm32"))]
//! Property-based tests using proptest.
//!
//! These tests check parser and matcher invariants over generated inputs,
//! complementing the targeted unit/integration tests and the fuzz target.

use m88k_asm::{
    assemble, assemble_for, AsmError, Cpu, Expr, McInst, McOperand, Opcode, ParsedOperand, Register,
    Span,
};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

/// Arbitrary ASCII text.
fn arb_asm_input() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::char::range('\0', '\x7f'), 0..256)
        .prop_map(|v| v.into_iter().collect())
}

/// Valid MC88100 statements from a curated pool.
fn valid_insn() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "addu %r1, %r2, %r3",
        "addu %r1, %r2, 100",
        "subu %r31, %r31, 16",
        "or.u %r2, %r0, 0xffff",
        "and.c %r3, %r4, %r5",
        "mask %r6, %r7, 0xff",
        "clr %r2, %r2, 4<8>",
        "set %r2, %r2, <3>",
        "ext %r4, %r5, 8<16>",
        "extu %r4, %r5, 12",
        "mak %r4, %r5, 0<0>",
        "rot %r4, %r5, <31>",
        "ff1 %r2, %r3",
        "ld %r2, %r31, 4",
        "ld.bu %r2, %r3, 0",
        "ld %r2, %r3[%r4]",
        "st %r2, %r31, 8",
        "st.b %r2, %r3, %r4",
        "ld.d %r2, %r31, 8",
        "ldcr %r2, %psr",
        "stcr %r2, %vbr",
        "fldcr %r2, %fpcr",
        "br 8",
        "bsr.n -16",
        "bb0 5, %r2, 64",
        "bcnd eq0, %r2, -8",
        "bcnd.n gt0, %r9, 0",
        "tb0 0, %r0, 128",
        "tcnd ne0, %r2, 511",
        "jmp %r1",
        "jsr.n %r25",
        "rte",
        "fadd.sss %r2, %r3, %r4",
        "fadd.ddd %r2, %r4, %r6",
    ])
}

fn gpr() -> impl Strategy<Value = u8> {
    0u8..32
}

/// Instruction content without its source location.
fn shape(inst: &McInst) -> (Opcode, Vec<McOperand>) {
    (inst.opcode, inst.operands.clone())
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// The assembler never panics, whatever the input.
    #[test]
    fn never_panics(src in arb_asm_input()) {
        let _ = assemble(&src);
        let _ = assemble_for(&src, Cpu::Mc88110);
    }

    /// Every curated statement assembles to exactly one instruction.
    #[test]
    fn valid_statements_assemble(insn in valid_insn()) {
        let result = assemble(insn).unwrap();
        prop_assert_eq!(result.len(), 1);
        prop_assert!(result.diagnostics().is_empty());
    }

    /// Joining valid statements keeps one instruction per line, in order.
    #[test]
    fn programs_preserve_order(insns in prop::collection::vec(valid_insn(), 1..32)) {
        let src = insns.join("\n");
        let result = assemble(&src).unwrap();
        prop_assert_eq!(result.len(), insns.len());
        for (inst, text) in result.instructions().iter().zip(&insns) {
            let single = assemble(text).unwrap();
            prop_assert_eq!(shape(inst), shape(&single.instructions()[0]));
        }
    }

    /// Re-emitted text parses back to the same instructions.
    #[test]
    fn text_round_trips(insns in prop::collection::vec(valid_insn(), 1..16)) {
        let first = assemble(&insns.join("\n")).unwrap();
        let second = assemble(&first.to_text()).unwrap();
        let a: Vec<_> = first.instructions().iter().map(shape).collect();
        let b: Vec<_> = second.instructions().iter().map(shape).collect();
        prop_assert_eq!(a, b);
    }

    /// `%rN` resolves to GPR N for every N, under any spelling case.
    #[test]
    fn registers_resolve(n in gpr(), upper in any::<bool>()) {
        let name = if upper { format!("R{n}") } else { format!("r{n}") };
        let result = assemble(&format!("jmp %{name}")).unwrap();
        prop_assert_eq!(&result.instructions()[0].operands[0], &McOperand::Reg(Register::gpr(n)));
    }

    /// Every register's printed name parses back to that register.
    #[test]
    fn printed_register_names_parse(id in 1u16..=192) {
        let reg = Register::from_id(id).unwrap();
        prop_assert_eq!(Register::from_name(&reg.to_string()), Some(reg));
    }

    /// Bitfield width and offset are accepted exactly on [0, 31].
    #[test]
    fn bitfield_bounds(w in 0i64..64, o in 0i64..64) {
        let result = assemble(&format!("ext %r1, %r2, {w}<{o}>"));
        if (0..32).contains(&w) && (0..32).contains(&o) {
            let result = result.unwrap();
            prop_assert_eq!(
                &result.instructions()[0].operands[2..],
                &[McOperand::Imm(w), McOperand::Imm(o)][..]
            );
        } else {
            prop_assert!(
                matches!(result, Err(AsmError::OperandDiagnostic { .. })),
                "expected OperandDiagnostic"
            );
        }
    }

    /// A bare integer becomes the offset with a zero width.
    #[test]
    fn bare_bitfield_is_offset(o in 0i64..32) {
        let result = assemble(&format!("extu %r1, %r2, {o}")).unwrap();
        prop_assert_eq!(result.instructions()[0].opcode, Opcode::EXTUbf);
        prop_assert_eq!(
            &result.instructions()[0].operands[2..],
            &[McOperand::Imm(0), McOperand::Imm(o)][..]
        );
    }

    /// Pixel rotation drops the low two bits, warning only when it has to.
    #[test]
    fn pixel_rotation_alignment(n in 0i64..64) {
        let result = assemble_for(&format!("prot %r2, %r4, <{n}>"), Cpu::Mc88110);
        let aligned = n & !3;
        if aligned > 60 {
            prop_assert!(result.is_err());
        } else {
            let result = result.unwrap();
            prop_assert_eq!(&result.instructions()[0].operands[2], &McOperand::Imm(aligned));
            prop_assert_eq!(result.diagnostics().len(), usize::from(n & 3 != 0));
        }
    }

    /// 16-bit branch displacements: even and in range, or rejected.
    #[test]
    fn pc_relative_16(off in -300_000i64..300_000) {
        let result = assemble(&format!("bcnd eq0, %r2, {off}"));
        let ok = off % 2 == 0 && (-(1i64 << 18)..(1i64 << 18)).contains(&off);
        prop_assert_eq!(result.is_ok(), ok);
        if !ok {
            prop_assert!(result.unwrap_err().to_string().ends_with("offset out of range"));
        }
    }

    /// 26-bit branch displacements, including symbol-relative ones.
    #[test]
    fn pc_relative_26(off in -(1i64 << 29)..(1i64 << 29)) {
        let ok = off % 2 == 0 && (-(1i64 << 28)..(1i64 << 28)).contains(&off);
        prop_assert_eq!(assemble(&format!("br {off}")).is_ok(), ok);
        prop_assert_eq!(assemble(&format!("br target+{off}")).is_ok(), ok);
    }

    /// Symbolic operands never satisfy a range class.
    #[test]
    fn symbolic_immediates_fail_ranges(name in "[a-z_][a-z0-9_]{0,8}") {
        let op = ParsedOperand::immediate(Some(Expr::symbol(name)), Span::dummy(), Span::dummy());
        prop_assert!(!op.is_u5_imm());
        prop_assert!(!op.is_u16_imm());
        prop_assert!(!op.is_s16_imm());
        prop_assert!(!op.is_bf_width());
        prop_assert!(!op.is_bf_offset());
        prop_assert!(!op.is_pixel_rot());
    }

    /// Range predicates accept exactly their bounds.
    #[test]
    fn range_predicate_bounds(v in -70_000i64..70_000) {
        let op = ParsedOperand::constant(v, Span::dummy(), Span::dummy());
        prop_assert_eq!(op.is_u5_imm(), (0..=31).contains(&v));
        prop_assert_eq!(op.is_u16_imm(), (0..=0xffff).contains(&v));
        prop_assert_eq!(op.is_s16_imm(), (-0x8000..=0x7fff).contains(&v));
        prop_assert_eq!(op.is_vec9(), (0..=511).contains(&v));
        prop_assert_eq!(op.is_pixel_rot(), (0..=60).contains(&v));
    }
}
