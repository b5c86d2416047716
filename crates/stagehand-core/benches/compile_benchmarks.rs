use criterion::{criterion_group, criterion_main, Criterion};
use stagehand_schema::{parse_config_str, ConfigFormat, EnvSnapshot, ProjectConfig};
use std::fmt::Write as _;

fn config_with_hooks(count: usize) -> ProjectConfig {
    let mut input = String::from(
        r#"
[project]
name = "bench"
[stage_1]
ports = ["{{BIND:-0.0.0.0}}:8080:80"]
[stage_1.image]
base = "ubuntu:${UBUNTU:-24.04}"
[stage_1.storage.data]
type = "volume"
"#,
    );
    for i in 0..count {
        let _ = write!(
            input,
            "[[stage_1.on_first_run]]\nscript = \"stage-1/hook-{i}.sh\"\nargs = [\"--n\", \"{i}\"]\n"
        );
    }
    for i in 0..count {
        let _ = write!(
            input,
            "[[stage_2.on_every_run]]\nscript = \"stage-2/hook-{i}.sh\"\n"
        );
    }
    parse_config_str(&input, ConfigFormat::Toml).unwrap()
}

fn bench_compile(c: &mut Criterion) {
    let small = config_with_hooks(2);
    let large = config_with_hooks(100);
    let env = EnvSnapshot::empty();

    c.bench_function("compile_2_hooks", |b| {
        b.iter(|| stagehand_core::compile(&small, &env).unwrap());
    });
    c.bench_function("compile_100_hooks", |b| {
        b.iter(|| stagehand_core::compile(&large, &env).unwrap());
    });
}

fn bench_write(c: &mut Criterion) {
    let output = stagehand_core::compile(&config_with_hooks(10), &EnvSnapshot::empty()).unwrap();
    c.bench_function("write_artifacts_10_hooks", |b| {
        b.iter_with_setup(
            || tempfile::tempdir().unwrap(),
            |dir| {
                output.artifacts.write_to(dir.path()).unwrap();
            },
        );
    });
}

criterion_group!(benches, bench_compile, bench_write);
criterion_main!(benches);
