//! Subtarget feature bits and CPU presets.
//!
//! Feature bits gate which mnemonics and operand classes the matcher accepts.
//! They are owned by each parsing session; the `.requires_88110` directive
//! widens them for the rest of the unit.

use alloc::vec::Vec;
use core::fmt;

bitflags::bitflags! {
    /// Optional ISA capabilities enabled for a parsing session.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FeatureBits: u32 {
        /// MC88100 baseline.
        const MC88100 = 1 << 0;
        /// MC88110 instruction set additions.
        const MC88110 = 1 << 1;
        /// MC88110 graphics (pixel) unit.
        const GRAPHICS = 1 << 2;
        /// MC88110 extended floating-point register file `x0`–`x31`.
        const XFR = 1 << 3;
    }
}

impl FeatureBits {
    /// Assembler-facing name of a single feature bit.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            f if f == FeatureBits::MC88100 => "mc88100",
            f if f == FeatureBits::MC88110 => "mc88110",
            f if f == FeatureBits::GRAPHICS => "graphics",
            f if f == FeatureBits::XFR => "xfr",
            _ => return None,
        })
    }

    /// Names of every set bit, lowest bit first.
    pub fn names(self) -> Vec<&'static str> {
        self.iter().filter_map(FeatureBits::name).collect()
    }
}

/// Processor models with their default feature sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cpu {
    /// Motorola MC88100.
    #[default]
    Mc88100,
    /// Motorola MC88110.
    Mc88110,
}

impl Cpu {
    /// Default feature bits for this CPU.
    pub fn features(self) -> FeatureBits {
        match self {
            Cpu::Mc88100 => FeatureBits::MC88100,
            Cpu::Mc88110 => FeatureBits::MC88110 | FeatureBits::GRAPHICS | FeatureBits::XFR,
        }
    }

    /// Look up a CPU by its `-mcpu` style name.
    pub fn from_name(name: &str) -> Option<Cpu> {
        match name {
            "mc88100" | "88100" => Some(Cpu::Mc88100),
            "mc88110" | "88110" => Some(Cpu::Mc88110),
            _ => None,
        }
    }
}

impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cpu::Mc88100 => write!(f, "mc88100"),
            Cpu::Mc88110 => write!(f, "mc88110"),
        }
    }
}
