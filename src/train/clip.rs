use burn::module::{AutodiffModule, ModuleVisitor, Param};
use burn::optim::GradientsParams;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};

/// Result of one global-norm clip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipOutcome {
    pub global_norm: f64,
    pub scale: f64,
}

impl ClipOutcome {
    pub fn clipped(&self) -> bool {
        self.scale < 1.0
    }

    pub fn is_finite(&self) -> bool {
        self.global_norm.is_finite()
    }
}

/// Factor applied to every gradient: `clip_norm / norm` above the bound, 1 otherwise.
pub fn clip_scale(global_norm: f64, clip_norm: f64) -> f64 {
    if global_norm > clip_norm {
        clip_norm / global_norm
    } else {
        1.0
    }
}

/// L2 norm over the concatenation of every parameter gradient of `module`.
pub fn global_grad_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm::<B> { grads, total: None };
    module.visit(&mut visitor);
    visitor
        .total
        .map(|total| total.into_scalar().elem::<f64>().sqrt())
        .unwrap_or(0.0)
}

/// Scale all gradients jointly so their global norm does not exceed `clip_norm`.
pub fn clip_by_global_norm<B, M>(
    module: &M,
    mut grads: GradientsParams,
    clip_norm: f64,
) -> (GradientsParams, ClipOutcome)
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let global_norm = global_grad_norm::<B, M>(module, &grads);
    let scale = clip_scale(global_norm, clip_norm);
    if scale != 1.0 {
        let mut visitor = Rescale {
            grads: &mut grads,
            scale,
        };
        module.visit(&mut visitor);
    }
    (grads, ClipOutcome { global_norm, scale })
}

struct SquaredNorm<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    total: Option<Tensor<B::InnerBackend, 1>>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        let Some(grad) = self.grads.get::<B::InnerBackend, D>(param.id) else {
            return;
        };
        let squared = grad.powf_scalar(2.0).sum();
        self.total = Some(match self.total.take() {
            Some(total) => total + squared,
            None => squared,
        });
    }
}

struct Rescale<'a> {
    grads: &'a mut GradientsParams,
    scale: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rescale<'_> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(param.id) {
            self.grads
                .register::<B::InnerBackend, D>(param.id, grad.mul_scalar(self.scale));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::module::Module;
    use burn::tensor::TensorData;
    use burn::tensor::backend::Backend as BackendTrait;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;

    type Backend = Autodiff<NdArray<f32>>;

    #[derive(Module, Debug)]
    struct Pair<B: BackendTrait> {
        a: Param<Tensor<B, 1>>,
        b: Param<Tensor<B, 2>>,
    }

    fn pair_with_grads() -> (Pair<Backend>, GradientsParams) {
        let device = Default::default();
        let pair = Pair::<Backend> {
            a: Param::from_tensor(Tensor::ones([2], &device)),
            b: Param::from_tensor(Tensor::ones([1, 1], &device)),
        };
        let weights = Tensor::<Backend, 1>::from_data(TensorData::new(vec![3.0f32, 4.0], [2]), &device);
        // d/da = [3, 4], d/db = [[12]]  =>  global norm 13
        let loss = (pair.a.val() * weights).sum() + pair.b.val().sum().mul_scalar(12.0);
        let grads = GradientsParams::from_grads(loss.backward(), &pair);
        (pair, grads)
    }

    fn grad_values<const D: usize>(grads: &GradientsParams, param: &Param<Tensor<Backend, D>>) -> Vec<f32> {
        grads
            .get::<NdArray<f32>, D>(param.id)
            .expect("gradient present")
            .into_data()
            .into_vec::<f32>()
            .expect("f32 values")
    }

    #[test]
    fn scale_is_one_below_the_bound() {
        assert_eq!(clip_scale(0.5, 1.0), 1.0);
        assert_eq!(clip_scale(1.0, 1.0), 1.0);
        assert_eq!(clip_scale(4.0, 1.0), 0.25);
    }

    #[test]
    fn norm_spans_all_parameters() {
        let (pair, grads) = pair_with_grads();
        let norm = global_grad_norm::<Backend, _>(&pair, &grads);
        assert!((norm - 13.0).abs() < 1e-5);
    }

    #[test]
    fn every_gradient_scaled_by_the_same_factor() {
        let (pair, grads) = pair_with_grads();
        let (grads, outcome) = clip_by_global_norm::<Backend, _>(&pair, grads, 6.5);
        assert!(outcome.clipped());
        assert!((outcome.scale - 0.5).abs() < 1e-9);

        let a = grad_values(&grads, &pair.a);
        let b = grad_values(&grads, &pair.b);
        assert!((a[0] - 1.5).abs() < 1e-5 && (a[1] - 2.0).abs() < 1e-5);
        assert!((b[0] - 6.0).abs() < 1e-5);
        assert!((global_grad_norm::<Backend, _>(&pair, &grads) - 6.5).abs() < 1e-4);
    }

    #[test]
    fn gradients_untouched_under_the_bound() {
        let (pair, grads) = pair_with_grads();
        let (grads, outcome) = clip_by_global_norm::<Backend, _>(&pair, grads, 20.0);
        assert!(!outcome.clipped());
        assert_eq!(grad_values(&grads, &pair.a), vec![3.0, 4.0]);
        assert_eq!(grad_values(&grads, &pair.b), vec![12.0]);
    }
}
