//! Output sinks for parsed statements.
//!
//! A [`Streamer`] receives each matched instruction, label, and
//! target directive in source order. [`RecordingStreamer`] keeps them in
//! memory; [`TextStreamer`] renders assembly text.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::error::Span;
use crate::ir::McInst;
use crate::table::OperandClass;

/// Consumer of assembled statements.
pub trait Streamer {
    /// A matched instruction.
    fn emit_instruction(&mut self, inst: &McInst);

    /// A label definition.
    fn emit_label(&mut self, name: &str, span: Span) {
        let _ = (name, span);
    }

    /// The `.requires_88110` directive.
    fn emit_directive_requires_88110(&mut self) {}
}

/// A label defined in the source, with its position in the instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Label {
    /// Label name.
    pub name: String,
    /// Index of the next instruction emitted after the label.
    pub index: usize,
    /// Where the label was defined.
    pub span: Span,
}

/// Collects everything in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingStreamer {
    /// Instructions in emission order.
    pub instructions: Vec<McInst>,
    /// Labels in definition order.
    pub labels: Vec<Label>,
    /// Set once `.requires_88110` was seen.
    pub requires_88110: bool,
}

impl Streamer for RecordingStreamer {
    fn emit_instruction(&mut self, inst: &McInst) {
        self.instructions.push(inst.clone());
    }

    fn emit_label(&mut self, name: &str, span: Span) {
        self.labels.push(Label {
            name: name.into(),
            index: self.instructions.len(),
            span,
        });
    }

    fn emit_directive_requires_88110(&mut self) {
        self.requires_88110 = true;
    }
}

/// Renders statements as assembly text.
#[derive(Debug, Clone, Default)]
pub struct TextStreamer {
    out: String,
}

impl TextStreamer {
    /// Empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text rendered so far.
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Take the rendered text.
    pub fn into_string(self) -> String {
        self.out
    }
}

impl Streamer for TextStreamer {
    fn emit_instruction(&mut self, inst: &McInst) {
        write_instruction(&mut self.out, inst);
        self.out.push('\n');
    }

    fn emit_label(&mut self, name: &str, _span: Span) {
        self.out.push_str(name);
        self.out.push_str(":\n");
    }

    fn emit_directive_requires_88110(&mut self) {
        self.out.push_str("\t.requires_88110\n");
    }
}

/// Render one instruction as `\tmnemonic\top, op, ...`.
///
/// Punctuation comes from the opcode's operand classes, so bitfield and
/// scaled forms print the way they are written.
pub fn format_instruction(inst: &McInst) -> String {
    let mut out = String::new();
    write_instruction(&mut out, inst);
    out
}

fn write_instruction(out: &mut String, inst: &McInst) {
    let desc = inst.opcode.desc();
    out.push('\t');
    out.push_str(desc.mnemonic);
    if desc.operands.is_empty() {
        return;
    }
    out.push('\t');

    let mut values = inst.operands.iter();
    let mut prev: Option<OperandClass> = None;
    for &class in desc.operands {
        match class {
            OperandClass::Literal(text) => {
                // `rot rD, rS, <o>` keeps its comma; `w<o>` and `rS1[rS2]` do not.
                if text == "<" && prev.is_some_and(OperandClass::is_register) {
                    out.push_str(", ");
                }
                out.push_str(text);
            }
            _ => {
                let glued = matches!(
                    prev,
                    None | Some(OperandClass::Literal("<")) | Some(OperandClass::Literal("["))
                );
                if !glued {
                    out.push_str(", ");
                }
                match values.next() {
                    Some(op) if class == OperandClass::PixelRot => {
                        let _ = write!(out, "<{}>", op);
                    }
                    Some(op) => {
                        let _ = write!(out, "{}", op);
                    }
                    None => out.push_str("<missing>"),
                }
            }
        }
        prev = Some(class);
    }
}
