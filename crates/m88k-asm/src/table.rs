//! Instruction table.
//!
//! Each [`InstrDesc`] names a mnemonic, the operand classes it expects after
//! the mnemonic, and the features it needs. Several descriptors may share a
//! mnemonic; the matcher tries them in table order.
//!
//! Literal classes describe the punctuation of bitfield (`w<o>`), rotate
//! (`<o>`) and scaled-index (`rS1[rS2]`) forms. They match the synthetic or
//! real tokens the parser places in the operand list and produce no
//! machine-code operand.

use crate::features::FeatureBits;

/// Expected kind of one operand position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandClass {
    /// 32-bit general register.
    Gpr,
    /// GPR pair; a plain GPR is accepted here.
    Gpr64,
    /// Extended floating-point register.
    Xr,
    /// Control register.
    Cr,
    /// Floating-point control register.
    Fcr,
    /// Unsigned 5-bit immediate.
    U5Imm,
    /// Unsigned 16-bit immediate.
    U16Imm,
    /// Signed 16-bit immediate.
    S16Imm,
    /// Trap vector, `[0, 511]`.
    Vec9,
    /// Bitfield width, `[0, 31]`.
    BfWidth,
    /// Bitfield offset, `[0, 31]`.
    BfOffset,
    /// Pixel rotation, `[0, 60]`.
    PixelRot,
    /// Branch/trap condition.
    CCode,
    /// 16-bit word displacement.
    PcRel16,
    /// 26-bit word displacement.
    PcRel26,
    /// Exact token spelling.
    Literal(&'static str),
}

impl OperandClass {
    /// Whether the class names a register file.
    pub fn is_register(self) -> bool {
        matches!(
            self,
            OperandClass::Gpr
                | OperandClass::Gpr64
                | OperandClass::Xr
                | OperandClass::Cr
                | OperandClass::Fcr
        )
    }
}

/// Static description of one instruction form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrDesc {
    /// Opcode produced on a successful match.
    pub opcode: Opcode,
    /// Lowercase mnemonic.
    pub mnemonic: &'static str,
    /// Operand classes, mnemonic excluded.
    pub operands: &'static [OperandClass],
    /// Features that must all be enabled.
    pub features: FeatureBits,
}

const GPR: OperandClass = OperandClass::Gpr;
const GPR64: OperandClass = OperandClass::Gpr64;
const XR: OperandClass = OperandClass::Xr;
const CR: OperandClass = OperandClass::Cr;
const FCR: OperandClass = OperandClass::Fcr;
const U5: OperandClass = OperandClass::U5Imm;
const U16: OperandClass = OperandClass::U16Imm;
const VEC9: OperandClass = OperandClass::Vec9;
const BFW: OperandClass = OperandClass::BfWidth;
const BFO: OperandClass = OperandClass::BfOffset;
const PROT: OperandClass = OperandClass::PixelRot;
const CC: OperandClass = OperandClass::CCode;
const PC16: OperandClass = OperandClass::PcRel16;
const PC26: OperandClass = OperandClass::PcRel26;
const LT: OperandClass = OperandClass::Literal("<");
const GT: OperandClass = OperandClass::Literal(">");
const LB: OperandClass = OperandClass::Literal("[");
const RB: OperandClass = OperandClass::Literal("]");

const BASE: FeatureBits = FeatureBits::empty();
const P110: FeatureBits = FeatureBits::MC88110;
const GFX: FeatureBits = FeatureBits::MC88110.union(FeatureBits::GRAPHICS);
const XFP: FeatureBits = FeatureBits::MC88110.union(FeatureBits::XFR);

macro_rules! instructions {
    ($($opc:ident => $mnemonic:literal, [$($class:expr),*], $features:expr;)*) => {
        /// Instruction opcodes. The discriminant indexes [`INSTRUCTIONS`].
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u16)]
        pub enum Opcode {
            $(
                #[doc = concat!("`", $mnemonic, "`")]
                $opc,
            )*
        }

        /// Every instruction form known to the built-in matcher.
        pub static INSTRUCTIONS: &[InstrDesc] = &[
            $(InstrDesc {
                opcode: Opcode::$opc,
                mnemonic: $mnemonic,
                operands: &[$($class),*],
                features: $features,
            },)*
        ];
    };
}

instructions! {
    // integer arithmetic
    ADDrr => "add", [GPR, GPR, GPR], BASE;
    ADDri => "add", [GPR, GPR, U16], BASE;
    ADDUrr => "addu", [GPR, GPR, GPR], BASE;
    ADDUri => "addu", [GPR, GPR, U16], BASE;
    SUBrr => "sub", [GPR, GPR, GPR], BASE;
    SUBri => "sub", [GPR, GPR, U16], BASE;
    SUBUrr => "subu", [GPR, GPR, GPR], BASE;
    SUBUri => "subu", [GPR, GPR, U16], BASE;
    CMPrr => "cmp", [GPR, GPR, GPR], BASE;
    CMPri => "cmp", [GPR, GPR, U16], BASE;
    MULUrr => "mulu", [GPR, GPR, GPR], BASE;
    MULUri => "mulu", [GPR, GPR, U16], BASE;
    MULSrr => "muls", [GPR, GPR, GPR], P110;
    MULUDrr => "mulu.d", [GPR64, GPR, GPR], P110;
    DIVUrr => "divu", [GPR, GPR, GPR], BASE;
    DIVUri => "divu", [GPR, GPR, U16], BASE;
    DIVSrr => "divs", [GPR, GPR, GPR], BASE;
    DIVSri => "divs", [GPR, GPR, U16], BASE;
    DIVUDrr => "divu.d", [GPR64, GPR64, GPR], P110;
    // logical
    ANDrr => "and", [GPR, GPR, GPR], BASE;
    ANDri => "and", [GPR, GPR, U16], BASE;
    ANDCrr => "and.c", [GPR, GPR, GPR], BASE;
    ANDUri => "and.u", [GPR, GPR, U16], BASE;
    ORrr => "or", [GPR, GPR, GPR], BASE;
    ORri => "or", [GPR, GPR, U16], BASE;
    ORCrr => "or.c", [GPR, GPR, GPR], BASE;
    ORUri => "or.u", [GPR, GPR, U16], BASE;
    XORrr => "xor", [GPR, GPR, GPR], BASE;
    XORri => "xor", [GPR, GPR, U16], BASE;
    XORCrr => "xor.c", [GPR, GPR, GPR], BASE;
    XORUri => "xor.u", [GPR, GPR, U16], BASE;
    MASKri => "mask", [GPR, GPR, U16], BASE;
    MASKUri => "mask.u", [GPR, GPR, U16], BASE;
    // bitfield
    CLRrr => "clr", [GPR, GPR, GPR], BASE;
    CLRbf => "clr", [GPR, GPR, BFW, LT, BFO, GT], BASE;
    SETrr => "set", [GPR, GPR, GPR], BASE;
    SETbf => "set", [GPR, GPR, BFW, LT, BFO, GT], BASE;
    EXTrr => "ext", [GPR, GPR, GPR], BASE;
    EXTbf => "ext", [GPR, GPR, BFW, LT, BFO, GT], BASE;
    EXTUrr => "extu", [GPR, GPR, GPR], BASE;
    EXTUbf => "extu", [GPR, GPR, BFW, LT, BFO, GT], BASE;
    MAKrr => "mak", [GPR, GPR, GPR], BASE;
    MAKbf => "mak", [GPR, GPR, BFW, LT, BFO, GT], BASE;
    ROTrr => "rot", [GPR, GPR, GPR], BASE;
    ROTbf => "rot", [GPR, GPR, LT, BFO, GT], BASE;
    FF0rr => "ff0", [GPR, GPR], BASE;
    FF1rr => "ff1", [GPR, GPR], BASE;
    // load/store
    LDri => "ld", [GPR, GPR, U16], BASE;
    LDrr => "ld", [GPR, GPR, GPR], BASE;
    LDrrs => "ld", [GPR, GPR, LB, GPR, RB], BASE;
    LDBri => "ld.b", [GPR, GPR, U16], BASE;
    LDBrr => "ld.b", [GPR, GPR, GPR], BASE;
    LDBUri => "ld.bu", [GPR, GPR, U16], BASE;
    LDBUrr => "ld.bu", [GPR, GPR, GPR], BASE;
    LDHri => "ld.h", [GPR, GPR, U16], BASE;
    LDHrr => "ld.h", [GPR, GPR, GPR], BASE;
    LDHrrs => "ld.h", [GPR, GPR, LB, GPR, RB], BASE;
    LDHUri => "ld.hu", [GPR, GPR, U16], BASE;
    LDHUrr => "ld.hu", [GPR, GPR, GPR], BASE;
    LDHUrrs => "ld.hu", [GPR, GPR, LB, GPR, RB], BASE;
    LDDri => "ld.d", [GPR64, GPR, U16], BASE;
    LDDrr => "ld.d", [GPR64, GPR, GPR], BASE;
    LDDrrs => "ld.d", [GPR64, GPR, LB, GPR, RB], BASE;
    LDArrs => "lda", [GPR, GPR, LB, GPR, RB], BASE;
    STri => "st", [GPR, GPR, U16], BASE;
    STrr => "st", [GPR, GPR, GPR], BASE;
    STrrs => "st", [GPR, GPR, LB, GPR, RB], BASE;
    STBri => "st.b", [GPR, GPR, U16], BASE;
    STBrr => "st.b", [GPR, GPR, GPR], BASE;
    STHri => "st.h", [GPR, GPR, U16], BASE;
    STHrr => "st.h", [GPR, GPR, GPR], BASE;
    STHrrs => "st.h", [GPR, GPR, LB, GPR, RB], BASE;
    STDri => "st.d", [GPR64, GPR, U16], BASE;
    STDrr => "st.d", [GPR64, GPR, GPR], BASE;
    STDrrs => "st.d", [GPR64, GPR, LB, GPR, RB], BASE;
    // control registers
    LDCR => "ldcr", [GPR, CR], BASE;
    STCR => "stcr", [GPR, CR], BASE;
    XCR => "xcr", [GPR, GPR, CR], BASE;
    FLDCR => "fldcr", [GPR, FCR], BASE;
    FSTCR => "fstcr", [GPR, FCR], BASE;
    FXCR => "fxcr", [GPR, GPR, FCR], BASE;
    // flow control
    BR => "br", [PC26], BASE;
    BRn => "br.n", [PC26], BASE;
    BSR => "bsr", [PC26], BASE;
    BSRn => "bsr.n", [PC26], BASE;
    BB0 => "bb0", [U5, GPR, PC16], BASE;
    BB0n => "bb0.n", [U5, GPR, PC16], BASE;
    BB1 => "bb1", [U5, GPR, PC16], BASE;
    BB1n => "bb1.n", [U5, GPR, PC16], BASE;
    BCND => "bcnd", [CC, GPR, PC16], BASE;
    BCNDn => "bcnd.n", [CC, GPR, PC16], BASE;
    JMP => "jmp", [GPR], BASE;
    JMPn => "jmp.n", [GPR], BASE;
    JSR => "jsr", [GPR], BASE;
    JSRn => "jsr.n", [GPR], BASE;
    RTE => "rte", [], BASE;
    // traps
    TB0 => "tb0", [U5, GPR, VEC9], BASE;
    TB1 => "tb1", [U5, GPR, VEC9], BASE;
    TCND => "tcnd", [CC, GPR, VEC9], BASE;
    TBNDrr => "tbnd", [GPR, GPR], BASE;
    TBNDri => "tbnd", [GPR, U16], BASE;
    // floating point
    FADDsss => "fadd.sss", [GPR, GPR, GPR], BASE;
    FADDddd => "fadd.ddd", [GPR64, GPR64, GPR64], BASE;
    FADDxxx => "fadd.xxx", [XR, XR, XR], XFP;
    FSUBsss => "fsub.sss", [GPR, GPR, GPR], BASE;
    FSUBddd => "fsub.ddd", [GPR64, GPR64, GPR64], BASE;
    FMULsss => "fmul.sss", [GPR, GPR, GPR], BASE;
    FMULddd => "fmul.ddd", [GPR64, GPR64, GPR64], BASE;
    FLTss => "flt.ss", [GPR, GPR], BASE;
    INTss => "int.ss", [GPR, GPR], BASE;
    TRNCss => "trnc.ss", [GPR, GPR], BASE;
    // graphics
    PADD => "padd", [GPR64, GPR64, GPR64], GFX;
    PADDb => "padd.b", [GPR64, GPR64, GPR64], GFX;
    PADDh => "padd.h", [GPR64, GPR64, GPR64], GFX;
    PSUB => "psub", [GPR64, GPR64, GPR64], GFX;
    PSUBb => "psub.b", [GPR64, GPR64, GPR64], GFX;
    PSUBh => "psub.h", [GPR64, GPR64, GPR64], GFX;
    PMUL => "pmul", [GPR64, GPR64, GPR], GFX;
    PPACK8 => "ppack.8", [GPR, GPR64, GPR64], GFX;
    PUNPKn => "punpk.n", [GPR64, GPR], GFX;
    PROTrr => "prot", [GPR64, GPR64, GPR], GFX;
    PROTri => "prot", [GPR64, GPR64, PROT], GFX;
}

impl Opcode {
    /// Table entry for this opcode.
    pub fn desc(self) -> &'static InstrDesc {
        &INSTRUCTIONS[self as usize]
    }

    /// Lowercase mnemonic.
    pub fn mnemonic(self) -> &'static str {
        self.desc().mnemonic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeSet;

    #[test]
    fn discriminants_index_the_table() {
        for (i, desc) in INSTRUCTIONS.iter().enumerate() {
            assert_eq!(desc.opcode as usize, i, "{}", desc.mnemonic);
            assert_eq!(desc.opcode.desc(), desc);
        }
    }

    #[test]
    fn forms_of_a_mnemonic_are_distinct() {
        let mut seen = BTreeSet::new();
        for desc in INSTRUCTIONS {
            assert!(
                seen.insert((desc.mnemonic, alloc::format!("{:?}", desc.operands))),
                "duplicate form for {}",
                desc.mnemonic
            );
        }
    }

    #[test]
    fn mnemonics_are_lowercase() {
        for desc in INSTRUCTIONS {
            assert_eq!(desc.mnemonic, desc.mnemonic.to_ascii_lowercase());
        }
    }

    #[test]
    fn literal_brackets_balance() {
        for desc in INSTRUCTIONS {
            let opens = desc
                .operands
                .iter()
                .filter(|c| matches!(c, OperandClass::Literal("<" | "[")))
                .count();
            let closes = desc
                .operands
                .iter()
                .filter(|c| matches!(c, OperandClass::Literal(">" | "]")))
                .count();
            assert_eq!(opens, closes, "{}", desc.mnemonic);
        }
    }

    #[test]
    fn graphics_forms_need_mc88110() {
        assert!(Opcode::PROTri.desc().features.contains(FeatureBits::MC88110));
        assert!(Opcode::PADD.desc().features.contains(FeatureBits::GRAPHICS));
        assert!(Opcode::ADDUrr.desc().features.is_empty());
        assert_eq!(Opcode::LDrrs.mnemonic(), "ld");
    }
}
