use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_engine::{Framework, FrameworkConfig};
use tessera_plugins::{register_builtin_algorithms, Spectrum, Workspace2D};

fn workspace(spectra: usize, bins: usize) -> Workspace2D {
    let x: Vec<f64> = (0..=bins).map(|edge| edge as f64).collect();
    let spectra = (0..spectra)
        .map(|index| {
            let y = vec![index as f64; bins];
            Spectrum::new(x.clone(), y.clone(), y).expect("spectrum")
        })
        .collect();
    Workspace2D::new(spectra)
}

fn scale_by_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("scale");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for workers in [1, 2, 4, 8] {
        let framework = Framework::new(FrameworkConfig {
            workers,
            record_history: false,
            ..FrameworkConfig::default()
        })
        .expect("framework");
        register_builtin_algorithms(framework.factory()).expect("register");
        framework
            .data_service()
            .add("raw", Arc::new(workspace(2048, 1024)))
            .expect("add");

        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            let mut scale = framework.create_unmanaged("Scale", None).expect("scale");
            scale.set_property_value("InputWorkspace", "raw").expect("input");
            scale.set_property_value("OutputWorkspace", "scaled").expect("output");
            scale.set_property("Factor", 1.5).expect("factor");
            b.iter(|| scale.execute().expect("execute"));
        });
    }

    group.finish();
}

fn normalise(c: &mut Criterion) {
    let framework = Framework::new(FrameworkConfig {
        record_history: false,
        ..FrameworkConfig::default()
    })
    .expect("framework");
    register_builtin_algorithms(framework.factory()).expect("register");
    framework
        .data_service()
        .add("raw", Arc::new(workspace(512, 512)))
        .expect("add");

    c.bench_function("normalise_512x512", |b| {
        let mut normalise = framework
            .create_unmanaged("NormaliseToTotal", None)
            .expect("normalise");
        normalise.set_property_value("InputWorkspace", "raw").expect("input");
        normalise.set_property_value("OutputWorkspace", "norm").expect("output");
        b.iter(|| normalise.execute().expect("execute"));
    });
}

criterion_group!(benches, scale_by_workers, normalise);
criterion_main!(benches);
