#![recursion_limit = "256"]

use std::time::{Duration, Instant};

use burn::optim::momentum::MomentumConfig;
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::tensor::Tensor;
use burn::tensor::backend::{AutodiffBackend, Backend as BackendTrait};
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use burn_recurrent_towers::dataset::BatchGenerator;
use burn_recurrent_towers::model::{RecurrentLm, RecurrentLmConfig, language_model_loss};
use burn_recurrent_towers::train::{TowerRunner, clip_by_global_norm, parallel_towers};
use burn_recurrent_towers::CellKind;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

#[cfg(feature = "cuda")]
use burn_cuda::Cuda;
#[cfg(feature = "wgpu")]
use burn_recurrent_towers::wgpu::init_runtime;
#[cfg(feature = "wgpu")]
use burn_wgpu::Wgpu;

#[derive(Clone, Copy)]
struct WindowConfig {
    name: &'static str,
    cell: CellKind,
    towers: usize,
    batch: usize,
    hidden: usize,
    window: usize,
}

const VOCAB: usize = 65;

const WINDOW_CONFIGS: &[WindowConfig] = &[
    WindowConfig {
        name: "srn_t1_b32_h128_f10",
        cell: CellKind::Srn,
        towers: 1,
        batch: 32,
        hidden: 128,
        window: 10,
    },
    WindowConfig {
        name: "lstm_t1_b32_h128_f10",
        cell: CellKind::Lstm,
        towers: 1,
        batch: 32,
        hidden: 128,
        window: 10,
    },
    WindowConfig {
        name: "lstm_t2_b32_h128_f10",
        cell: CellKind::Lstm,
        towers: 2,
        batch: 32,
        hidden: 128,
        window: 10,
    },
    WindowConfig {
        name: "lstm_t4_b64_h256_f20",
        cell: CellKind::Lstm,
        towers: 4,
        batch: 64,
        hidden: 256,
        window: 20,
    },
];

fn window_bench(c: &mut Criterion) {
    run_window_backend::<Autodiff<NdArray<f32>>, _>(c, "ndarray", |_| {});

    #[cfg(feature = "wgpu")]
    run_window_backend::<Autodiff<Wgpu<f32>>, _>(c, "wgpu", init_runtime);

    #[cfg(feature = "cuda")]
    run_window_backend::<Autodiff<Cuda<f32>>, _>(c, "cuda", |_| {});
}

fn run_window_backend<B, Init>(c: &mut Criterion, backend_name: &'static str, init_backend: Init)
where
    B: AutodiffBackend,
    Init: Fn(&<B as BackendTrait>::Device),
{
    let device = <B as BackendTrait>::Device::default();
    <B as BackendTrait>::seed(&device, 24);
    init_backend(&device);

    let mut group = c.benchmark_group(format!("synchronized_window/{backend_name}"));
    let optimizer_config =
        SgdConfig::new().with_momentum(Some(MomentumConfig::new().with_momentum(0.9).with_dampening(0.0)));

    for cfg in WINDOW_CONFIGS {
        let model = RecurrentLm::<B>::new(
            RecurrentLmConfig {
                cell: cfg.cell,
                vocab_size: VOCAB,
                hidden_size: cfg.hidden,
                init_range: 0.1,
            },
            &device,
        );
        let runners: Vec<_> = (0..cfg.towers)
            .map(|tower| TowerRunner::new(tower, cfg.window, VOCAB))
            .collect();
        let batches: Vec<Vec<Tensor<B, 2>>> = (0..cfg.towers)
            .map(|tower| {
                let tokens: Vec<u32> = (0..cfg.batch * cfg.window * 4)
                    .map(|idx| ((idx * 31 + tower * 7) % VOCAB) as u32)
                    .collect();
                BatchGenerator::new(tower, tokens, cfg.batch, cfg.window, VOCAB)
                    .expect("bench generator")
                    .next_batch()
                    .one_hot::<B>(&device)
            })
            .collect();

        let run_window = |model: RecurrentLm<B>| {
            let jobs: Vec<_> = batches
                .iter()
                .map(|steps| (model.clone(), steps.clone(), model.zero_state(cfg.batch, &device)))
                .collect();
            let windows = parallel_towers(jobs, |tower, (model, steps, state)| {
                runners[tower].run_training_window(model.cell(), model.projection(), &steps, 0, state)
            })
            .expect("towers");
            let (outputs, labels): (Vec<_>, Vec<_>) = windows
                .into_iter()
                .flat_map(|window| window.outputs.into_iter().zip(window.labels))
                .unzip();
            let loss = language_model_loss(Tensor::cat(outputs, 0), Tensor::cat(labels, 0));
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            let (grads, _) = clip_by_global_norm::<B, _>(&model, grads, 1.0);
            let mut optimizer = optimizer_config.init::<B, RecurrentLm<B>>();
            optimizer.step(1.0, model, grads)
        };

        // Warm-up pass to keep graph building out of the measurement.
        let _ = run_window(model.clone());

        group.throughput(Throughput::Elements((cfg.towers * cfg.batch * cfg.window) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(cfg.name), cfg, |b, _| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let start = Instant::now();
                    let _ = run_window(model.clone());
                    total += start.elapsed();
                }
                total
            });
        });
    }

    group.finish();
}

criterion_group!(benches, window_bench);
criterion_main!(benches);
