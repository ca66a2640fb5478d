use std::sync::Arc;

use sprs::{CsMat, TriMat};

use inverse_solver::{
    psnr, Algorithm, ForwardOperator, OptimConfig, Optimizer, Red, Tensor, L2, SIGMA_DENOISER,
};

/// Tridiagonal blur [¼, ½, ¼] with reflecting ends
fn sparse_blur(dim: usize) -> CsMat<f64> {
    let mut tri = TriMat::new((dim, dim));
    for i in 0..dim {
        let left = if i == 0 { 1 } else { i - 1 };
        let right = if i + 1 == dim { dim - 2 } else { i + 1 };
        tri.add_triplet(i, i, 0.5);
        tri.add_triplet(i, left, 0.25);
        tri.add_triplet(i, right, 0.25);
    }
    tri.to_csr()
}

/// Neighbour averaging with strength σ
fn smooth(x: &Tensor, sigma: f64) -> inverse_solver::Result<Tensor> {
    let (batch, dim) = x.shape();
    Ok(Tensor::from_fn(batch, dim, |b, j| {
        let l = x[(b, j.saturating_sub(1))];
        let r = x[(b, (j + 1).min(dim - 1))];
        (1.0 - sigma) * x[(b, j)] + 0.5 * sigma * (l + r)
    }))
}

fn main() {
    println!("=== Sparse Deblurring Demo (HQS + RED) ===\n");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            println!("Loading config: {}", path);
            OptimConfig::from_file(&path).expect("Failed to load config")
        }
        None => {
            let mut cfg = OptimConfig::with_anderson();
            cfg.max_iter = 80;
            cfg.thres_conv = 1e-6;
            cfg.set_prior_param(SIGMA_DENOISER, 0.3);
            cfg
        }
    };
    println!("{}\n", config);

    let dim = 48;
    let a = sparse_blur(dim);
    println!("Operator: {}×{} sparse blur, {} non-zeros", a.rows(), a.cols(), a.nnz());

    let x_true = Tensor::from_fn(2, dim, |b, j| {
        let t = j as f64 / dim as f64;
        if b == 0 {
            if (0.3..0.6).contains(&t) { 0.9 } else { 0.1 }
        } else {
            0.5 + 0.4 * (2.0 * std::f64::consts::PI * t).sin()
        }
    });
    let noise = Tensor::from_fn(2, dim, |b, j| 0.02 * ((7 * j + 13 * b) as f64).sin());
    let blurred = ForwardOperator::apply(&a, &x_true).expect("Blur failed");
    let y = blurred + noise;

    let optimizer = Optimizer::from_algorithm(
        Algorithm::HalfQuadraticSplitting,
        Arc::new(L2::new()),
        Arc::new(Red::new(smooth)),
        config,
    )
    .expect("Invalid configuration");

    let output = optimizer.run(&y, &a, Some(&x_true)).expect("Run failed");

    println!("\nResults:");
    println!("  {}", output.stats);
    println!("  PSNR observation: {:.2} dB", psnr(&y, &x_true));
    println!("  PSNR estimate:    {:.2} dB", psnr(&output.estimate, &x_true));

    if let Some(metrics) = output.metrics {
        println!("\n  iter   residual      psnr");
        let residual = metrics.get("residual").unwrap_or(&[]);
        let series = metrics.get("psnr").unwrap_or(&[]);
        for (k, (r, p)) in residual.iter().zip(series.iter()).enumerate().step_by(5) {
            println!("  {:>4}   {:.3e}   {:.2}", k, r, p);
        }
    }
}

