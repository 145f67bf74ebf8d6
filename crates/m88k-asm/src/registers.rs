//! The M88k register file.
//!
//! Registers are identified by a dense numeric id. Id 0 is reserved for
//! "no register", so every [`Register`] value names a real register.
//!
//! | Class   | Spelling          | Ids        |
//! |---------|-------------------|------------|
//! | GPR     | `r0`–`r31`        | 1–32       |
//! | XR      | `x0`–`x31`        | 33–64      |
//! | CR      | `cr0`–`cr63`      | 65–128     |
//! | FCR     | `fcr0`–`fcr63`    | 129–192    |
//! | GPR64   | (pairs, no name)  | 193–208    |
//!
//! GPR64 pairs (`r0:r1`, `r2:r3`, …) are the 64-bit view used by
//! double-precision and graphics instructions. They cannot be written
//! directly in source; a plain GPR is accepted where a pair is expected.

use core::fmt;

const GPR_BASE: u16 = 1;
const XR_BASE: u16 = 33;
const CR_BASE: u16 = 65;
const FCR_BASE: u16 = 129;
const GPR64_BASE: u16 = 193;
const END: u16 = 209;

/// Control-register aliases (`cr0`–`cr7`).
const CR_ALT_NAMES: [&str; 8] = ["pid", "psr", "epsr", "ssbr", "sxip", "snip", "sfip", "vbr"];

/// Floating-point control-register aliases as `(index, name)`.
const FCR_ALT_NAMES: [(u8, &str); 11] = [
    (0, "fpecr"),
    (1, "fphs1"),
    (2, "fpls1"),
    (3, "fphs2"),
    (4, "fpls2"),
    (5, "fppt"),
    (6, "fprh"),
    (7, "fprl"),
    (8, "fpit"),
    (62, "fpsr"),
    (63, "fpcr"),
];

/// Register classes of the M88k.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegClass {
    /// 32-bit general-purpose registers.
    Gpr,
    /// 64-bit even/odd GPR pairs.
    Gpr64,
    /// MC88110 extended floating-point registers.
    Xr,
    /// Integer-unit control registers.
    Cr,
    /// Floating-point-unit control registers.
    Fcr,
}

/// Sub-register index into a GPR64 pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SubRegIndex {
    /// Even (high-order) half of the pair.
    Hi,
    /// Odd (low-order) half of the pair.
    Lo,
}

/// A physical M88k register.
///
/// Serialized as its numeric id; ids outside the register file are
/// rejected on the way back in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u16", into = "u16"))]
pub struct Register(u16);

/// A numeric id that names no register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRegisterId(pub u16);

impl fmt::Display for InvalidRegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid register id {} (expected {}..{})", self.0, GPR_BASE, END)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InvalidRegisterId {}

impl TryFrom<u16> for Register {
    type Error = InvalidRegisterId;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        Register::from_id(id).ok_or(InvalidRegisterId(id))
    }
}

impl From<Register> for u16 {
    fn from(reg: Register) -> u16 {
        reg.0
    }
}

impl Register {
    /// General-purpose register `r{n}`.
    ///
    /// # Panics
    ///
    /// Panics if `n > 31`.
    pub const fn gpr(n: u8) -> Register {
        assert!(n < 32, "GPR index out of range");
        Register(GPR_BASE + n as u16)
    }

    /// Extended floating-point register `x{n}`.
    ///
    /// # Panics
    ///
    /// Panics if `n > 31`.
    pub const fn xr(n: u8) -> Register {
        assert!(n < 32, "XR index out of range");
        Register(XR_BASE + n as u16)
    }

    /// Control register `cr{n}`.
    ///
    /// # Panics
    ///
    /// Panics if `n > 63`.
    pub const fn cr(n: u8) -> Register {
        assert!(n < 64, "CR index out of range");
        Register(CR_BASE + n as u16)
    }

    /// Floating-point control register `fcr{n}`.
    ///
    /// # Panics
    ///
    /// Panics if `n > 63`.
    pub const fn fcr(n: u8) -> Register {
        assert!(n < 64, "FCR index out of range");
        Register(FCR_BASE + n as u16)
    }

    /// GPR pair whose even half is `r{n & !1}`.
    ///
    /// # Panics
    ///
    /// Panics if `n > 31`.
    pub const fn gpr64(n: u8) -> Register {
        assert!(n < 32, "GPR index out of range");
        Register(GPR64_BASE + (n / 2) as u16)
    }

    /// Rebuild a register from its numeric id.
    pub fn from_id(id: u16) -> Option<Register> {
        (GPR_BASE..END).contains(&id).then_some(Register(id))
    }

    /// Numeric id (never 0).
    #[inline]
    pub fn id(self) -> u16 {
        self.0
    }

    /// Register class.
    pub fn class(self) -> RegClass {
        match self.0 {
            id if id < XR_BASE => RegClass::Gpr,
            id if id < CR_BASE => RegClass::Xr,
            id if id < FCR_BASE => RegClass::Cr,
            id if id < GPR64_BASE => RegClass::Fcr,
            _ => RegClass::Gpr64,
        }
    }

    /// Number within the class (`r5` → 5, pair `r4:r5` → 2).
    pub fn index(self) -> u8 {
        let base = match self.class() {
            RegClass::Gpr => GPR_BASE,
            RegClass::Xr => XR_BASE,
            RegClass::Cr => CR_BASE,
            RegClass::Fcr => FCR_BASE,
            RegClass::Gpr64 => GPR64_BASE,
        };
        (self.0 - base) as u8
    }

    /// Sub-register of a GPR64 pair. `None` for every other class.
    pub fn sub_register(self, idx: SubRegIndex) -> Option<Register> {
        if self.class() != RegClass::Gpr64 {
            return None;
        }
        let even = self.index() * 2;
        Some(match idx {
            SubRegIndex::Hi => Register::gpr(even),
            SubRegIndex::Lo => Register::gpr(even + 1),
        })
    }

    /// Alternate (symbolic) name, for control registers that have one.
    pub fn alt_name(self) -> Option<&'static str> {
        match self.class() {
            RegClass::Cr => CR_ALT_NAMES.get(self.index() as usize).copied(),
            RegClass::Fcr => FCR_ALT_NAMES
                .iter()
                .find(|(n, _)| *n == self.index())
                .map(|(_, name)| *name),
            _ => None,
        }
    }

    /// Match a primary register name (`r7`, `x3`, `cr12`, `fcr63`).
    ///
    /// Case-insensitive. Pairs have no primary name and never match.
    pub fn from_name(name: &str) -> Option<Register> {
        let mut buf = [0u8; 8];
        let lower = to_lower_buf(name, &mut buf)?;
        let (ctor, digits, limit): (fn(u8) -> Register, &str, u8) =
            if let Some(d) = lower.strip_prefix("fcr") {
                (Register::fcr, d, 64)
            } else if let Some(d) = lower.strip_prefix("cr") {
                (Register::cr, d, 64)
            } else if let Some(d) = lower.strip_prefix('r') {
                (Register::gpr, d, 32)
            } else if let Some(d) = lower.strip_prefix('x') {
                (Register::xr, d, 32)
            } else {
                return None;
            };
        let n = parse_reg_number(digits)?;
        (n < limit).then(|| ctor(n))
    }

    /// Match an alternate register name (`psr`, `vbr`, `fpcr`).
    pub fn from_alt_name(name: &str) -> Option<Register> {
        let mut buf = [0u8; 8];
        let lower = to_lower_buf(name, &mut buf)?;
        if let Some(i) = CR_ALT_NAMES.iter().position(|n| *n == lower) {
            return Some(Register::cr(i as u8));
        }
        FCR_ALT_NAMES
            .iter()
            .find(|(_, n)| *n == lower)
            .map(|(i, _)| Register::fcr(*i))
    }
}

/// Decimal register number without sign or leading zeros.
fn parse_reg_number(digits: &str) -> Option<u8> {
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

fn to_lower_buf<'b>(s: &str, buf: &'b mut [u8]) -> Option<&'b str> {
    if s.len() > buf.len() || !s.is_ascii() {
        return None;
    }
    let out = &mut buf[..s.len()];
    out.copy_from_slice(s.as_bytes());
    out.make_ascii_lowercase();
    core::str::from_utf8(out).ok()
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.index();
        match self.class() {
            RegClass::Gpr => write!(f, "r{}", n),
            RegClass::Xr => write!(f, "x{}", n),
            RegClass::Cr => write!(f, "cr{}", n),
            RegClass::Fcr => write!(f, "fcr{}", n),
            RegClass::Gpr64 => write!(f, "r{}:r{}", n * 2, n * 2 + 1),
        }
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Register({})", self)
    }
}
