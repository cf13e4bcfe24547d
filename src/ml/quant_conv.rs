// ============================================================
// Layer 5 — Predictive Quantized Convolution
// ============================================================
// Drop-in replacement for a bias-free Conv2d that computes on
// reduced-precision operands:
//
//   input  ─ sparsify? ─ quantize(num_bits, input_signed) ─┐
//   weight ─────────────  quantize(num_bits_weight) ───────┴─ conv2d ─ fine
//
// With `predictive_forward` a second, coarse convolution runs on
// the most-significant bits only (msb_bits / msb_bits_weight).
// Outputs the coarse pass predicts at or below `threshold` keep
// the coarse value; everything else takes the fine result.
//
// Quantization is symmetric per tensor. Unsigned inputs (post-ReLU
// activations) use all bits for the magnitude and saturate any
// negative value at zero. Rounding is straight-through, so the
// backward pass sees the identity.
//
// Reference: Burn Book §3 (Building Blocks)

use burn::{
    module::{Ignored, Param},
    nn::Initializer,
    prelude::*,
    tensor::{module::conv2d, ops::ConvOptions},
};

use crate::domain::config::PrecisionProfile;

// ─── Quantizers ───────────────────────────────────────────────────────────────
/// Fake-quantize `x` to `bits` with a per-tensor scale taken from max |x|.
///
/// Signed tensors map onto `[-(2^(bits-1) - 1), 2^(bits-1) - 1]`, unsigned
/// ones onto `[0, 2^bits - 1]`. Out-of-range values saturate.
pub fn quantize<B: Backend, const D: usize>(x: Tensor<B, D>, bits: u32, signed: bool) -> Tensor<B, D> {
    let levels = (if signed { (1u32 << (bits - 1)) - 1 } else { (1u32 << bits) - 1 }) as f32;
    let floor  = if signed { -levels } else { 0.0 };

    let scale = x
        .clone()
        .detach()
        .abs()
        .max()
        .clamp_min(f32::EPSILON)
        .div_scalar(levels)
        .reshape([1usize; D])
        .expand(x.shape());

    let q = x.clone().div(scale.clone()).round().clamp(floor, levels).mul(scale);

    // straight-through rounding
    x.clone() + (q - x).detach()
}

/// Zero every element whose magnitude is below `threshold`.
pub fn sparsify<B: Backend, const D: usize>(x: Tensor<B, D>, threshold: f64) -> Tensor<B, D> {
    let small = x.clone().abs().lower_elem(threshold);
    x.mask_fill(small, 0.0)
}

// ─── ConvQuant ────────────────────────────────────────────────────────────────
/// Precision settings carried by one convolution: the shared profile plus
/// the per-call `input_signed` override.
#[derive(Debug, Clone)]
pub struct ConvQuant {
    pub profile:      PrecisionProfile,
    pub input_signed: bool,
}

// ─── Config ───────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct PredictiveConv2dConfig {
    pub in_channels:  usize,
    pub out_channels: usize,
    pub kernel_size:  usize,
    pub profile:      PrecisionProfile,
    #[config(default = 1)]
    pub stride:       usize,
    #[config(default = 0)]
    pub padding:      usize,
    #[config(default = true)]
    pub input_signed: bool,
}

impl PredictiveConv2dConfig {
    /// 3x3 convolution with padding 1.
    pub fn conv3x3(in_channels: usize, out_channels: usize, profile: &PrecisionProfile) -> Self {
        Self::new(in_channels, out_channels, 3, profile.clone()).with_padding(1)
    }

    /// 1x1 convolution without padding.
    pub fn conv1x1(in_channels: usize, out_channels: usize, profile: &PrecisionProfile) -> Self {
        Self::new(in_channels, out_channels, 1, profile.clone())
    }

    /// Weights ~ N(0, sqrt(2 / (k * k * out_channels))).
    pub fn init<B: Backend>(&self, device: &B::Device) -> PredictiveConv2d<B> {
        let fan_out = self.kernel_size * self.kernel_size * self.out_channels;
        let std     = (2.0 / fan_out as f64).sqrt();
        let weight  = Initializer::Normal { mean: 0.0, std }.init(
            [self.out_channels, self.in_channels, self.kernel_size, self.kernel_size],
            device,
        );

        PredictiveConv2d {
            weight,
            stride:  self.stride,
            padding: self.padding,
            quant:   Ignored(ConvQuant {
                profile:      self.profile.clone(),
                input_signed: self.input_signed,
            }),
        }
    }
}

// ─── Module ───────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct PredictiveConv2d<B: Backend> {
    /// Shape: [out_channels, in_channels, k, k]
    pub weight:  Param<Tensor<B, 4>>,
    pub stride:  usize,
    pub padding: usize,
    pub quant:   Ignored<ConvQuant>,
}

impl<B: Backend> PredictiveConv2d<B> {
    /// input: [batch, in_channels, h, w] → [batch, out_channels, h', w']
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let quant   = &self.quant.0;
        let profile = &quant.profile;

        let input = if profile.sparsify {
            sparsify(input, profile.threshold)
        } else {
            input
        };
        let weight = self.weight.val();

        let fine = self.convolve(
            quantize(input.clone(), profile.num_bits, quant.input_signed),
            quantize(weight.clone(), profile.num_bits_weight, true),
        );
        if !profile.predictive_forward {
            return fine;
        }

        let coarse = self.convolve(
            quantize(input, profile.msb_bits, quant.input_signed),
            quantize(weight, profile.msb_bits_weight, true),
        );
        let predicted_off = if profile.sign {
            coarse.clone().lower_equal_elem(profile.threshold)
        } else {
            coarse.clone().abs().lower_equal_elem(profile.threshold)
        };
        fine.mask_where(predicted_off, coarse)
    }

    pub fn input_signed(&self) -> bool {
        self.quant.0.input_signed
    }

    fn convolve(&self, input: Tensor<B, 4>, weight: Tensor<B, 4>) -> Tensor<B, 4> {
        conv2d(
            input,
            weight,
            None,
            ConvOptions::new([self.stride; 2], [self.padding; 2], [1, 1], 1),
        )
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray;

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    fn vector(v: &[f32]) -> Tensor<TestBackend, 1> {
        Tensor::from_data(TensorData::new(v.to_vec(), [v.len()]), &Default::default())
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_signed_two_bit_quantization() {
        // levels = 1, scale = max|x| = 1
        let q = quantize(vector(&[-1.0, -0.3, 0.2, 0.6, 1.0]), 2, true);
        assert_close(&values(q), &[-1.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_unsigned_quantization_saturates_negatives() {
        // levels = 3, scale = 3 / 3 = 1
        let q = quantize(vector(&[-0.7, 0.0, 0.9, 1.6, 3.0]), 2, false);
        assert_close(&values(q), &[0.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_eight_bit_quantization_is_close_to_input() {
        let device = Default::default();
        let x: Tensor<TestBackend, 4> = Tensor::random([2, 3, 4, 4], Distribution::Normal(0.0, 1.0), &device);
        let max = values(x.clone().abs().max())[0];
        let q   = values(quantize(x.clone(), 8, true));
        let step = max / 127.0;
        for (orig, quant) in values(x).iter().zip(q) {
            assert!((orig - quant).abs() <= step * 0.5 + 1e-5);
        }
    }

    #[test]
    fn test_all_zero_tensor_stays_zero() {
        let q = quantize(vector(&[0.0, 0.0, 0.0]), 8, true);
        assert_eq!(values(q), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sparsify_zeroes_small_values() {
        let s = sparsify(vector(&[1e-4, -2e-4, 0.5, -0.7]), 5e-4);
        assert_eq!(values(s), vec![0.0, 0.0, 0.5, -0.7]);
    }

    #[test]
    fn test_conv_output_shapes() {
        let device  = Default::default();
        let profile = PrecisionProfile::default();
        let x: Tensor<TestBackend, 4> = Tensor::random([2, 3, 8, 8], Distribution::Default, &device);

        let same = PredictiveConv2dConfig::conv3x3(3, 4, &profile).init::<TestBackend>(&device);
        assert_eq!(same.forward(x.clone()).dims(), [2, 4, 8, 8]);

        let down = PredictiveConv2dConfig::conv3x3(3, 4, &profile)
            .with_stride(2)
            .init::<TestBackend>(&device);
        assert_eq!(down.forward(x.clone()).dims(), [2, 4, 4, 4]);

        let point = PredictiveConv2dConfig::conv1x1(3, 6, &profile)
            .with_stride(2)
            .init::<TestBackend>(&device);
        assert_eq!(point.forward(x).dims(), [2, 6, 4, 4]);
    }

    #[test]
    fn test_input_signed_override_is_recorded() {
        let device  = Default::default();
        let profile = PrecisionProfile::default();
        let conv = PredictiveConv2dConfig::conv3x3(3, 4, &profile)
            .with_input_signed(false)
            .init::<TestBackend>(&device);
        assert!(!conv.input_signed());
    }

    #[test]
    fn test_predictive_forward_matches_plain_when_msb_equals_full() {
        let device = Default::default();
        let plain  = PrecisionProfile { num_bits: 6, num_bits_weight: 6, ..Default::default() };
        let conv   = PredictiveConv2dConfig::conv3x3(3, 4, &plain).init::<TestBackend>(&device);

        let mut predictive = conv.clone();
        predictive.quant = Ignored(ConvQuant {
            profile: PrecisionProfile {
                predictive_forward: true,
                msb_bits:           6,
                msb_bits_weight:    6,
                ..plain.clone()
            },
            input_signed: true,
        });

        let x: Tensor<TestBackend, 4> = Tensor::random([1, 3, 6, 6], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(values(conv.forward(x.clone())), values(predictive.forward(x)));
    }

    #[test]
    fn test_predictive_forward_only_replaces_predicted_off_outputs() {
        let device    = Default::default();
        let threshold = 0.05;
        let plain     = PrecisionProfile { threshold, ..Default::default() };
        let conv      = PredictiveConv2dConfig::conv3x3(3, 4, &plain).init::<TestBackend>(&device);

        let mut predictive = conv.clone();
        predictive.quant = Ignored(ConvQuant {
            profile: PrecisionProfile {
                predictive_forward: true,
                msb_bits:           2,
                msb_bits_weight:    2,
                ..plain.clone()
            },
            input_signed: true,
        });

        let x: Tensor<TestBackend, 4> = Tensor::random([2, 3, 6, 6], Distribution::Normal(0.0, 1.0), &device);
        let fine = values(conv.forward(x.clone()));
        let pred = values(predictive.forward(x));

        // Every output is either the fine value or a coarse value at or below threshold
        for (f, p) in fine.iter().zip(pred) {
            assert!(*f == p || p <= threshold as f32, "fine={f}, predictive={p}");
        }
    }

    fn unit_conv(profile: &PrecisionProfile) -> PredictiveConv2d<TestBackend> {
        let device   = Default::default();
        let mut conv = PredictiveConv2dConfig::conv1x1(1, 1, profile).init::<TestBackend>(&device);
        conv.weight  = Param::from_tensor(Tensor::ones([1, 1, 1, 1], &device));
        conv
    }

    fn pixels(v: [f32; 4]) -> Tensor<TestBackend, 4> {
        Tensor::from_data(TensorData::new(v.to_vec(), [1, 1, 2, 2]), &Default::default())
    }

    #[test]
    fn test_magnitude_prediction_keeps_large_negative_outputs() {
        let base = PrecisionProfile {
            threshold:       0.05,
            msb_bits:        2,
            msb_bits_weight: 2,
            ..Default::default()
        };
        let by_sign      = PrecisionProfile { predictive_forward: true, sign: true, ..base.clone() };
        let by_magnitude = PrecisionProfile { predictive_forward: true, sign: false, ..base.clone() };

        // 2-bit coarse pass sees [-2, 0, 0, 2]
        let x     = pixels([-1.4, -0.01, 0.01, 2.0]);
        let fine  = values(unit_conv(&base).forward(x.clone()));
        let signd = values(unit_conv(&by_sign).forward(x.clone()));
        let magn  = values(unit_conv(&by_magnitude).forward(x));

        assert!(fine[0] < -1.0);
        assert!(fine[1] != 0.0 && fine[2] != 0.0);

        // sign: a negative coarse output counts as predicted off
        assert!((signd[0] + 2.0).abs() < 1e-5, "{signd:?}");
        // magnitude: |-2| is above threshold, so the fine value stays
        assert_eq!(magn[0], fine[0]);
        assert_eq!(&magn[1..3], &[0.0, 0.0]);
        assert_eq!(magn[3], fine[3]);
    }

    #[test]
    fn test_magnitude_prediction_replaces_only_small_coarse_outputs() {
        let device    = Default::default();
        let threshold = 0.05;
        let plain     = PrecisionProfile { threshold, ..Default::default() };
        let conv      = PredictiveConv2dConfig::conv3x3(3, 4, &plain).init::<TestBackend>(&device);

        let mut predictive = conv.clone();
        predictive.quant = Ignored(ConvQuant {
            profile: PrecisionProfile {
                predictive_forward: true,
                sign:               false,
                msb_bits:           2,
                msb_bits_weight:    2,
                ..plain.clone()
            },
            input_signed: true,
        });

        let x: Tensor<TestBackend, 4> = Tensor::random([2, 3, 6, 6], Distribution::Normal(0.0, 1.0), &device);
        let fine = values(conv.forward(x.clone()));
        let pred = values(predictive.forward(x));

        for (f, p) in fine.iter().zip(pred) {
            assert!(*f == p || p.abs() <= threshold as f32, "fine={f}, predictive={p}");
        }
    }

    #[test]
    fn test_sparsify_inside_conv_drops_small_inputs() {
        let plain  = PrecisionProfile { threshold: 0.05, ..Default::default() };
        let sparse = PrecisionProfile { sparsify: true, ..plain.clone() };

        let x     = pixels([-1.4, -0.01, 0.01, 2.0]);
        let dense = values(unit_conv(&plain).forward(x.clone()));
        let thin  = values(unit_conv(&sparse).forward(x));

        assert!(dense[1] != 0.0 && dense[2] != 0.0);
        assert_eq!(thin, vec![dense[0], 0.0, 0.0, dense[3]]);
    }

    #[test]
    fn test_gradient_fields_leave_forward_unchanged() {
        let plain = PrecisionProfile::default();
        let grads = PrecisionProfile {
            num_bits_grad:       Some(8),
            msb_bits_grad:       4,
            biprecision:         true,
            predictive_backward: false,
            ..plain.clone()
        };

        let x = pixels([-1.4, -0.01, 0.01, 2.0]);
        assert_eq!(values(unit_conv(&plain).forward(x.clone())), values(unit_conv(&grads).forward(x)));
    }
}
