//! Basic assembly example: the one-shot and builder APIs.
//!
//! Run with: `cargo run --example basic`

use m88k_asm::{assemble, Assembler, Cpu};

fn main() {
    println!("=== m88k_asm basic example ===\n");

    // --- One-shot assembly ---
    println!("1. One-shot assembly:");
    let result = assemble("or.u %r2, %r0, 0x1234\nor %r2, %r2, 0x5678").unwrap();
    for inst in result.instructions() {
        println!("   {:?} {:?}", inst.opcode, inst.operands);
    }

    // --- Builder API ---
    println!("\n2. Builder API (copy loop):");
    let mut asm = Assembler::new(Cpu::Mc88100);
    asm.emit(
        r#"
copy:
    ld      %r5, %r3[%r4]      ; load word
    st      %r5, %r2[%r4]
    subu    %r4, %r4, 1
    bcnd.n  ne0, %r4, copy
    ext     %r6, %r5, 8<16>
    jmp     %r1
"#,
    )
    .unwrap();
    let result = asm.finish().unwrap();
    print!("{}", result.listing());

    // --- 88110 graphics ---
    println!("\n3. 88110 graphics, with a warning:");
    let mut asm = Assembler::new(Cpu::Mc88100);
    asm.emit(".requires_88110\npadd %r2, %r4, %r6\nprot %r2, %r4, <6>")
        .unwrap();
    let result = asm.finish().unwrap();
    print!("{}", result.to_text());
    for d in result.diagnostics() {
        println!("   {}", d);
    }

    // --- Error reporting ---
    println!("\n4. Error reporting:");
    match assemble("addu %r1, %r2\nbr 3\nadu %r1, %r2, %r3") {
        Ok(_) => println!("   unexpected success"),
        Err(e) => {
            for err in e.into_errors() {
                println!("   error: {}", err);
            }
        }
    }
}
