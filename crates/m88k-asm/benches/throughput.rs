//! Performance benchmarks for `m88k_asm`.
//!
//! Measures:
//! - Single statement latency per operand shape
//! - Multi-statement throughput (bytes of source text)
//! - Lowering of machine instructions
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use m88k_asm::{
    assemble, assemble_for, lower, Cpu, ElfSymbolNamer, M88kRegisterInfo, MachineInstr,
    MachineOperand, Opcode, Register, TargetFlags,
};

// ─── Single-Statement Latency ────────────────────────────────────────────────

fn bench_single_statement(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_statement");

    group.bench_function("addu_rrr", |b| {
        b.iter(|| assemble(black_box("addu %r1, %r2, %r3")).unwrap())
    });

    group.bench_function("or_u_imm", |b| {
        b.iter(|| assemble(black_box("or.u %r2, %r0, 0x1234")).unwrap())
    });

    group.bench_function("ext_bitfield", |b| {
        b.iter(|| assemble(black_box("ext %r1, %r2, 5<3>")).unwrap())
    });

    group.bench_function("ld_scaled", |b| {
        b.iter(|| assemble(black_box("ld %r1, %r2[%r3]")).unwrap())
    });

    group.bench_function("bcnd_keyword", |b| {
        b.iter(|| assemble(black_box("bcnd ne0, %r2, loop")).unwrap())
    });

    group.bench_function("prot_88110", |b| {
        b.iter(|| assemble_for(black_box("prot %r2, %r4, <8>"), Cpu::Mc88110).unwrap())
    });

    group.bench_function("unknown_mnemonic", |b| {
        b.iter(|| assemble(black_box("adu %r1, %r2, %r3")).unwrap_err())
    });

    group.finish();
}

// ─── Multi-Statement Throughput ──────────────────────────────────────────────

fn gen_block(n: usize) -> String {
    let body = [
        "addu %r2, %r2, 1",
        "ld %r3, %r4[%r2]",
        "ext %r5, %r3, 8<16>",
        "st %r5, %r31, 8",
        "bcnd ne0, %r5, loop",
    ];
    let mut s = String::from("loop:\n");
    for i in 0..n {
        s.push_str(body[i % body.len()]);
        s.push('\n');
    }
    s
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    for n in [100, 1_000, 5_000] {
        let src = gen_block(n);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_function(format!("{n}_statements"), |b| {
            b.iter(|| assemble(black_box(&src)).unwrap())
        });
    }
    group.finish();
}

// ─── Lowering ────────────────────────────────────────────────────────────────

fn bench_lowering(c: &mut Criterion) {
    let mi = MachineInstr::new(Opcode::ORUri)
        .with(MachineOperand::reg(Register::gpr(2)))
        .with(MachineOperand::reg(Register::gpr(0)))
        .with(MachineOperand::global("table").with_offset(16).with_flags(TargetFlags::AbsHi));
    c.bench_function("lower_or_u_hi16", |b| {
        b.iter(|| lower(black_box(&mi), &M88kRegisterInfo, &ElfSymbolNamer).unwrap())
    });
}

criterion_group!(benches, bench_single_statement, bench_throughput, bench_lowering);
criterion_main!(benches);
