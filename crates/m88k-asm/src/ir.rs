//! Machine-code level instruction representation.
//!
//! [`McInst`] is what both front ends produce: the assembly parser after a
//! successful match, and the lowerer from a code generator's
//! [`MachineInstr`](crate::lower::MachineInstr). Operands are registers,
//! plain immediates, or symbolic expressions.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::Span;
use crate::registers::Register;
use crate::table::Opcode;

/// Target-specific expression wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariantKind {
    /// High 16 bits of an absolute address (`%hi16(expr)`).
    AbsHi,
    /// Low 16 bits of an absolute address (`%lo16(expr)`).
    AbsLo,
}

impl VariantKind {
    /// Assembler spelling of the wrapper.
    pub fn prefix(self) -> &'static str {
        match self {
            VariantKind::AbsHi => "%hi16",
            VariantKind::AbsLo => "%lo16",
        }
    }

    /// Look up a wrapper by its name without the `%`, case-insensitively.
    pub fn from_name(name: &str) -> Option<VariantKind> {
        if name.eq_ignore_ascii_case("hi16") {
            Some(VariantKind::AbsHi)
        } else if name.eq_ignore_ascii_case("lo16") {
            Some(VariantKind::AbsLo)
        } else {
            None
        }
    }
}

/// Symbolic or numeric expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// A numeric literal.
    Num(i64),
    /// A symbol reference.
    Symbol(String),
    /// `l + r`
    Add(Box<Expr>, Box<Expr>),
    /// `l - r`
    Sub(Box<Expr>, Box<Expr>),
    /// `l * r`
    Mul(Box<Expr>, Box<Expr>),
    /// `l / r`
    Div(Box<Expr>, Box<Expr>),
    /// `l & r`
    And(Box<Expr>, Box<Expr>),
    /// `l | r`
    Or(Box<Expr>, Box<Expr>),
    /// `l ^ r`
    Xor(Box<Expr>, Box<Expr>),
    /// `l << r`
    Shl(Box<Expr>, Box<Expr>),
    /// `l >> r` (arithmetic)
    Shr(Box<Expr>, Box<Expr>),
    /// `-e`
    Neg(Box<Expr>),
    /// `~e`
    Not(Box<Expr>),
    /// Target wrapper around a sub-expression.
    Target(VariantKind, Box<Expr>),
}

impl Expr {
    /// Symbol reference.
    pub fn symbol(name: impl Into<String>) -> Expr {
        Expr::Symbol(name.into())
    }

    /// `l + r`
    pub fn add(l: Expr, r: Expr) -> Expr {
        Expr::Add(Box::new(l), Box::new(r))
    }

    /// Wrap in a target variant.
    pub fn target(kind: VariantKind, e: Expr) -> Expr {
        Expr::Target(kind, Box::new(e))
    }

    /// Try to evaluate to a constant.
    ///
    /// Returns `None` if the expression references a symbol, divides by
    /// zero, or shifts by an out-of-range amount. Target wrappers never
    /// fold, since their value is only known after relocation.
    pub fn eval(&self) -> Option<i64> {
        Some(match self {
            Expr::Num(n) => *n,
            Expr::Symbol(_) | Expr::Target(..) => return None,
            Expr::Add(l, r) => l.eval()?.wrapping_add(r.eval()?),
            Expr::Sub(l, r) => l.eval()?.wrapping_sub(r.eval()?),
            Expr::Mul(l, r) => l.eval()?.wrapping_mul(r.eval()?),
            Expr::Div(l, r) => l.eval()?.checked_div(r.eval()?)?,
            Expr::And(l, r) => l.eval()? & r.eval()?,
            Expr::Or(l, r) => l.eval()? | r.eval()?,
            Expr::Xor(l, r) => l.eval()? ^ r.eval()?,
            Expr::Shl(l, r) => l.eval()?.checked_shl(u32::try_from(r.eval()?).ok()?)?,
            Expr::Shr(l, r) => l.eval()?.checked_shr(u32::try_from(r.eval()?).ok()?)?,
            Expr::Neg(e) => e.eval()?.wrapping_neg(),
            Expr::Not(e) => !e.eval()?,
        })
    }

    /// Collapse to [`Expr::Num`] when the whole tree is constant.
    pub fn fold(self) -> Expr {
        match self.eval() {
            Some(n) => Expr::Num(n),
            None => self,
        }
    }

    /// `Some(n)` if this is already a literal.
    pub fn as_constant(&self) -> Option<i64> {
        match self {
            Expr::Num(n) => Some(*n),
            _ => None,
        }
    }

    fn binary(&self) -> Option<(&'static str, &Expr, &Expr)> {
        Some(match self {
            Expr::Add(l, r) => ("+", l, r),
            Expr::Sub(l, r) => ("-", l, r),
            Expr::Mul(l, r) => ("*", l, r),
            Expr::Div(l, r) => ("/", l, r),
            Expr::And(l, r) => ("&", l, r),
            Expr::Or(l, r) => ("|", l, r),
            Expr::Xor(l, r) => ("^", l, r),
            Expr::Shl(l, r) => ("<<", l, r),
            Expr::Shr(l, r) => (">>", l, r),
            _ => return None,
        })
    }
}

/// Print a sub-expression, parenthesised when it is itself binary.
fn fmt_operand(e: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if e.binary().is_some() {
        write!(f, "({})", e)
    } else {
        write!(f, "{}", e)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((op, l, r)) = self.binary() {
            fmt_operand(l, f)?;
            f.write_str(op)?;
            return fmt_operand(r, f);
        }
        match self {
            Expr::Num(n) => write!(f, "{}", n),
            Expr::Symbol(s) => f.write_str(s),
            Expr::Neg(e) => {
                f.write_str("-")?;
                fmt_operand(e, f)
            }
            Expr::Not(e) => {
                f.write_str("~")?;
                fmt_operand(e, f)
            }
            Expr::Target(kind, e) => write!(f, "{}({})", kind.prefix(), e),
            _ => Ok(()),
        }
    }
}

/// Machine-code operand.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum McOperand {
    /// Physical register.
    Reg(Register),
    /// Immediate value.
    Imm(i64),
    /// Symbolic expression, resolved later.
    Expr(Expr),
}

impl McOperand {
    /// The register, if this is a register operand.
    pub fn reg(&self) -> Option<Register> {
        match self {
            McOperand::Reg(r) => Some(*r),
            _ => None,
        }
    }

    /// The immediate, if this is an immediate operand.
    pub fn imm(&self) -> Option<i64> {
        match self {
            McOperand::Imm(v) => Some(*v),
            _ => None,
        }
    }

    /// The expression, if this is an expression operand.
    pub fn expr(&self) -> Option<&Expr> {
        match self {
            McOperand::Expr(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for McOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McOperand::Reg(r) => write!(f, "%{}", r),
            McOperand::Imm(v) => write!(f, "{}", v),
            McOperand::Expr(e) => write!(f, "{}", e),
        }
    }
}

/// A machine-code instruction: opcode plus ordered operands.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct McInst {
    /// Opcode from the instruction table.
    pub opcode: Opcode,
    /// Operands in encoding order.
    pub operands: Vec<McOperand>,
    /// Source location (dummy for lowered instructions).
    pub span: Span,
}

impl McInst {
    /// Empty instruction with the given opcode.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operands: Vec::new(),
            span: Span::dummy(),
        }
    }

    /// Append an operand.
    pub fn push(&mut self, op: McOperand) {
        self.operands.push(op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn eval_constant_tree() {
        let e = Expr::Sub(
            Box::new(Expr::Shl(Box::new(Expr::Num(1)), Box::new(Expr::Num(4)))),
            Box::new(Expr::Neg(Box::new(Expr::Num(2)))),
        );
        assert_eq!(e.eval(), Some(18));
        assert_eq!(e.fold(), Expr::Num(18));
    }

    #[test]
    fn eval_stops_at_symbols_and_bad_arithmetic() {
        assert_eq!(Expr::add(Expr::symbol("x"), Expr::Num(1)).eval(), None);
        assert_eq!(
            Expr::Div(Box::new(Expr::Num(1)), Box::new(Expr::Num(0))).eval(),
            None
        );
        assert_eq!(
            Expr::Shl(Box::new(Expr::Num(1)), Box::new(Expr::Num(64))).eval(),
            None
        );
        assert_eq!(Expr::target(VariantKind::AbsLo, Expr::Num(5)).eval(), None);
    }

    #[test]
    fn display_nests_with_parens() {
        let e = Expr::add(
            Expr::symbol("foo"),
            Expr::Mul(Box::new(Expr::Num(2)), Box::new(Expr::Num(3))),
        );
        assert_eq!(e.to_string(), "foo+(2*3)");
        assert_eq!(
            Expr::target(VariantKind::AbsHi, Expr::add(Expr::symbol("g"), Expr::Num(8)))
                .to_string(),
            "%hi16(g+8)"
        );
        assert_eq!(Expr::Not(Box::new(Expr::Num(0))).to_string(), "~0");
    }

    #[test]
    fn operand_display() {
        assert_eq!(McOperand::Reg(Register::gpr(2)).to_string(), "%r2");
        assert_eq!(McOperand::Imm(-4).to_string(), "-4");
        assert_eq!(McOperand::Expr(Expr::symbol("L1")).to_string(), "L1");
    }
}
