#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Fuzz both CPU presets.
    let _ = m88k_asm::assemble(data);
    let _ = m88k_asm::assemble_for(data, m88k_asm::Cpu::Mc88110);

    let mut asm = m88k_asm::Assembler::new(m88k_asm::Cpu::Mc88100);
    for line in data.lines() {
        let _ = asm.emit(line);
    }
    if let Ok(result) = asm.finish() {
        // Re-emitted text must assemble again.
        let _ = result.listing();
        assert!(m88k_asm::assemble_for(&result.to_text(), m88k_asm::Cpu::Mc88110).is_ok());
    }
});
