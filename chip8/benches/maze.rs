use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use chip8::prelude::*;

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("maze bytecode", |b| {
        b.iter_batched(
            || {
                let mut vm = Chip8Vm::new(Chip8Conf { seed: Some(0) });
                vm.load_bytecode(include_bytes!("../programs/maze")).unwrap();
                vm
            },
            |mut vm| {
                let step_count = black_box(1000_usize);
                black_box(vm.run_steps(step_count))
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
