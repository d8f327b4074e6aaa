//! Processing-tick benchmarks
//!
//! One tick must finish well inside the 50 ms display interval for all twelve leads.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ecg_processing::{
    AcquisitionPipeline, BeatDetector, DetectionConfig, FilterMode, FilterSettings, MonitorConfig,
};

fn synthetic_channels(i: usize) -> [f64; 8] {
    let beat = if i % 40 == 0 { 300.0 } else { 0.0 };
    let wander = 20.0 * (i as f64 * 0.02).sin();
    [
        500.0 + 0.6 * beat + wander,
        500.0 + 1.1 * beat,
        500.0 + 1.0 * beat,
        500.0 + beat + wander,
        500.0 + 0.7 * beat,
        500.0 + 0.8 * beat,
        500.0 - 0.4 * beat,
        500.0 + 0.3 * beat,
    ]
}

fn filled_pipeline(mode: FilterMode) -> AcquisitionPipeline {
    let config = MonitorConfig {
        filter: FilterSettings {
            mode,
            ..FilterSettings::default()
        },
        ..MonitorConfig::twelve_lead_test()
    };
    let pipeline = match AcquisitionPipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => panic!("benchmark configuration rejected: {e}"),
    };
    if let Err(e) = pipeline.start() {
        panic!("cannot start acquisition: {e}");
    }
    for i in 0..400 {
        let _ = pipeline.ingest(&synthetic_channels(i));
    }
    pipeline
}

/// Benchmark a full twelve-lead tick in both filter modes
fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for mode in [FilterMode::Causal, FilterMode::ZeroPhase] {
        let mut pipeline = filled_pipeline(mode);
        let mut i = 400;
        group.bench_with_input(
            BenchmarkId::new("twelve_lead", format!("{:?}", mode)),
            &mode,
            |b, _| {
                b.iter(|| {
                    let _ = pipeline.ingest(&synthetic_channels(i));
                    i += 1;
                    black_box(pipeline.tick())
                });
            },
        );
    }

    group.finish();
}

fn bench_detection(c: &mut Criterion) {
    let detector = BeatDetector::new(&DetectionConfig::default(), 50.0);
    let window: Vec<f64> = (0..100)
        .map(|i| if i % 40 == 5 { 300.0 } else { (i as f64 * 0.3).sin() * 10.0 })
        .collect();

    c.bench_function("detect_100_samples", |b| {
        b.iter(|| black_box(detector.detect(black_box(&window))))
    });
}

criterion_group!(benches, bench_tick, bench_detection);
criterion_main!(benches);
