// ============================================================
// Layer 5 — Global-Norm Gradient Clipping
// ============================================================
// Rescales every gradient by the same factor when the L2 norm
// taken over ALL parameters jointly exceeds `max_norm`:
//
//   total = sqrt( Σ_params ‖g‖² )
//   if total > max_norm:  g ← g · max_norm / (total + 1e-6)
//
// Burn's optimiser-level clipping works per tensor, so the joint
// norm is computed here with two module visitors over the
// gradient store before `optim.step`.

use std::marker::PhantomData;

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

const EPS: f64 = 1e-6;

/// Clip `grads` in place; returns the norm measured before clipping.
pub fn clip_global_norm<B, M>(module: &M, grads: &mut GradientsParams, max_norm: f64) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut norm = SquaredNorm::<B> { grads: &*grads, sum_sq: 0.0, _backend: PhantomData };
    module.visit(&mut norm);
    let total = norm.sum_sq.sqrt();

    if total.is_finite() && total > max_norm {
        let scale = max_norm / (total + EPS);
        let mut scaler = Rescale::<B> { grads, scale, _backend: PhantomData };
        module.visit(&mut scaler);
        tracing::trace!("Clipped gradients: norm {:.4} → {:.4}", total, max_norm);
    }
    total
}

struct SquaredNorm<'a, B: AutodiffBackend> {
    grads:    &'a GradientsParams,
    sum_sq:   f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.sum_sq += grad.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
    }
}

struct Rescale<'a, B: AutodiffBackend> {
    grads:    &'a mut GradientsParams,
    scale:    f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rescale<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id.clone()) {
            self.grads.register::<B::InnerBackend, D>(id, grad.mul_scalar(self.scale));
        }
    }
}
