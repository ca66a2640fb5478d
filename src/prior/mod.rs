//! Regularizers g(x)
//!
//! The engine never calls a prior directly; the iterator steps do. Priors
//! receive the prior parameters resolved for the current iteration (for
//! instance `sigma_denoiser` for [`Red`]).

use crate::error::Result;
use crate::optim::schedule::ParamSet;
use crate::utils::Tensor;

/// Key of the denoiser noise level in the prior schedule
pub const SIGMA_DENOISER: &str = "sigma_denoiser";

/// Regularizer capability consumed by the iterator steps
pub trait Prior: Send + Sync {
    /// g(x)
    fn value(&self, x: &Tensor, params: &ParamSet) -> Result<f64>;

    /// ∇g(x) (or a subgradient)
    fn grad(&self, x: &Tensor, params: &ParamSet) -> Result<Tensor>;

    /// prox_{γg}(v)
    fn prox(&self, v: &Tensor, params: &ParamSet, gamma: f64) -> Result<Tensor>;
}

/// g(x) = ½ ||x||²
#[derive(Debug, Clone, Copy, Default)]
pub struct Tikhonov;

impl Prior for Tikhonov {
    fn value(&self, x: &Tensor, _params: &ParamSet) -> Result<f64> {
        Ok(0.5 * x.norm_squared())
    }

    fn grad(&self, x: &Tensor, _params: &ParamSet) -> Result<Tensor> {
        Ok(x.clone())
    }

    fn prox(&self, v: &Tensor, _params: &ParamSet, gamma: f64) -> Result<Tensor> {
        Ok(v / (1.0 + gamma))
    }
}

/// g(x) = ||x||₁
#[derive(Debug, Clone, Copy, Default)]
pub struct L1;

impl Prior for L1 {
    fn value(&self, x: &Tensor, _params: &ParamSet) -> Result<f64> {
        Ok(x.iter().map(|v| v.abs()).sum())
    }

    fn grad(&self, x: &Tensor, _params: &ParamSet) -> Result<Tensor> {
        Ok(x.map(|v| if v == 0.0 { 0.0 } else { v.signum() }))
    }

    /// Soft thresholding at level γ
    fn prox(&self, v: &Tensor, _params: &ParamSet, gamma: f64) -> Result<Tensor> {
        Ok(v.map(|x| x.signum() * (x.abs() - gamma).max(0.0)))
    }
}

/// Denoiser D(x, σ)
pub trait Denoiser: Send + Sync {
    fn denoise(&self, x: &Tensor, sigma: f64) -> Result<Tensor>;
}

impl<F> Denoiser for F
where
    F: Fn(&Tensor, f64) -> Result<Tensor> + Send + Sync,
{
    fn denoise(&self, x: &Tensor, sigma: f64) -> Result<Tensor> {
        self(x, sigma)
    }
}

/// Regularization by denoising
///
/// ```text
/// g(x)  = ½ <x, x − D(x, σ)>
/// ∇g(x) = x − D(x, σ)
/// ```
///
/// The proximal step is replaced by the denoiser itself (plug-and-play).
#[derive(Debug, Clone)]
pub struct Red<D> {
    denoiser: D,
}

impl<D: Denoiser> Red<D> {
    pub fn new(denoiser: D) -> Self {
        Self { denoiser }
    }

    fn denoised(&self, x: &Tensor, params: &ParamSet) -> Result<Tensor> {
        let sigma = params.get(SIGMA_DENOISER)?;
        self.denoiser.denoise(x, sigma)
    }
}

impl<D: Denoiser> Prior for Red<D> {
    fn value(&self, x: &Tensor, params: &ParamSet) -> Result<f64> {
        let d = self.denoised(x, params)?;
        Ok(0.5 * x.dot(&(x - d)))
    }

    fn grad(&self, x: &Tensor, params: &ParamSet) -> Result<Tensor> {
        let d = self.denoised(x, params)?;
        Ok(x - d)
    }

    fn prox(&self, v: &Tensor, params: &ParamSet, _gamma: f64) -> Result<Tensor> {
        self.denoised(v, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OptimError;
    use approx::assert_relative_eq;

    fn shrink(x: &Tensor, sigma: f64) -> Result<Tensor> {
        Ok(x * (1.0 / (1.0 + sigma)))
    }

    #[test]
    fn test_tikhonov() {
        let x = Tensor::from_row_slice(1, 2, &[2.0, -4.0]);
        let p = ParamSet::new();
        assert_relative_eq!(Tikhonov.value(&x, &p).unwrap(), 10.0, epsilon = 1e-14);
        assert_eq!(Tikhonov.prox(&x, &p, 1.0).unwrap(), Tensor::from_row_slice(1, 2, &[1.0, -2.0]));
    }

    #[test]
    fn test_l1_soft_threshold() {
        let x = Tensor::from_row_slice(1, 4, &[3.0, -0.5, 0.0, -2.0]);
        let p = ParamSet::new();
        let out = L1.prox(&x, &p, 1.0).unwrap();
        assert_eq!(out, Tensor::from_row_slice(1, 4, &[2.0, 0.0, 0.0, -1.0]));
        assert_relative_eq!(L1.value(&x, &p).unwrap(), 5.5, epsilon = 1e-14);
    }

    #[test]
    fn test_red_gradient_uses_sigma() {
        let red = Red::new(shrink);
        let params: ParamSet = [(SIGMA_DENOISER, 1.0)].into_iter().collect();
        let x = Tensor::from_row_slice(1, 2, &[2.0, 4.0]);
        assert_eq!(red.grad(&x, &params).unwrap(), Tensor::from_row_slice(1, 2, &[1.0, 2.0]));
        assert_eq!(red.prox(&x, &params, 0.3).unwrap(), Tensor::from_row_slice(1, 2, &[1.0, 2.0]));
        // ½ <x, x − D(x)> = ½ (2 + 8)
        assert_relative_eq!(red.value(&x, &params).unwrap(), 5.0, epsilon = 1e-14);
    }

    #[test]
    fn test_red_requires_sigma() {
        let red = Red::new(shrink);
        let err = red.grad(&Tensor::zeros(1, 1), &ParamSet::new()).unwrap_err();
        assert!(matches!(err, OptimError::MissingParameter(ref n) if n == SIGMA_DENOISER));
    }
}
