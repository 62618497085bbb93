use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use desiccator_core::calibration::{CalibrationSample, fit_linear};
use desiccator_core::filter::trimmed_mean;

// Synthetic HX711 batch: offset plus white noise, with a spike every `spike_every` samples
fn synth_batch(n: usize, noise_amp: f32, spike_every: usize, seed: u32) -> Vec<i32> {
    // tiny PRNG
    let mut state = seed.max(1);
    let mut next_f32 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f32) / (u32::MAX as f32 + 1.0)
    };
    let mut v = Vec::with_capacity(n);
    for i in 0..n {
        let noise = (next_f32() * 2.0 - 1.0) * noise_amp; // [-amp, +amp]
        let spike = if spike_every > 0 && i % spike_every == spike_every - 1 {
            25_000.0
        } else {
            0.0
        };
        v.push((842_913.0 + noise + spike) as i32);
    }
    v
}

pub fn bench_trimmed_mean(c: &mut Criterion) {
    let mut g = c.benchmark_group("trimmed_mean");
    // Allow quick tweaking without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p desiccator_core --bench reduction
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    for &n in &[10usize, 25, 100] {
        let batch = synth_batch(n, 40.0, 7, 0xC0FFEE);
        g.bench_function(format!("batch_{n}"), |b| {
            b.iter_batched(
                || batch.clone(),
                |s| {
                    let m = trimmed_mean(black_box(&s), 0.1, 0.9);
                    black_box(m);
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

pub fn bench_fit(c: &mut Criterion) {
    let samples: Vec<CalibrationSample> = (0..6)
        .map(|i| {
            let grams = f64::from(i) * 50.0;
            CalibrationSample {
                measurement: 842_913.0 + grams * 420.0,
                known_mass: grams,
            }
        })
        .collect();
    c.bench_function("fit_linear_6", |b| {
        b.iter(|| black_box(fit_linear(black_box(&samples))))
    });
}

criterion_group!(reduction, bench_trimmed_mean, bench_fit);
criterion_main!(reduction);
