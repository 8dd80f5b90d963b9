use criterion::{black_box, criterion_group, criterion_main, Criterion};
use patito::{
    codegen::CompiledProgram,
    compile_source,
    vm::{TestingDevice, VirtualMachine},
};
use std::fs::read_to_string;

const DEMOS: &[(&str, &str)] = &[
    ("Factorial", "demos/factorial.pat"),
    ("Fibonacci", "demos/fibonacci.pat"),
    ("Loops", "demos/loops.pat"),
];

fn compile_file(filename: &str) -> CompiledProgram {
    compile_source(&read_to_string(filename).unwrap()).unwrap()
}

fn run_compiled(compiled: &CompiledProgram) -> String {
    VirtualMachine::new(TestingDevice::new())
        .execute(&compiled.object_code())
        .unwrap()
        .output_str()
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Demo Programs");
    group.sample_size(20);

    for (name, path) in DEMOS {
        group.bench_function(format!("{name} (compile)"), |b| {
            b.iter(|| compile_file(black_box(path)))
        });
        group.bench_function(format!("{name} (compile + run)"), |b| {
            b.iter(|| run_compiled(&compile_file(black_box(path))))
        });

        let precompiled = compile_file(path);
        group.bench_function(format!("{name} (precompiled run)"), |b| {
            b.iter(|| run_compiled(black_box(&precompiled)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
