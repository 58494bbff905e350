//! Convolutional building blocks shared by the generator and discriminator
//!
//! All normalization here is per-channel instance norm, expressed as a group
//! norm with one group per channel. Convolutions carry no bias; the norm's
//! affine parameters take that role.

use candle_core::{Result, Tensor};
use candle_nn::ops::leaky_relu;
use candle_nn::{conv2d_no_bias, group_norm, Conv2d, Conv2dConfig, GroupNorm, Module, VarBuilder};

const NORM_EPS: f64 = 1e-5;
const LRELU_SLOPE: f64 = 0.2;

fn instance_norm(channels: usize, vb: VarBuilder) -> Result<GroupNorm> {
    group_norm(channels, channels, NORM_EPS, vb)
}

/// 3x3 conv (stride 1) -> instance norm -> LeakyReLU(0.2)
#[derive(Debug)]
pub struct ConvBlock {
    conv: Conv2d,
    norm: GroupNorm,
}

impl ConvBlock {
    pub fn new(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let conv = conv2d_no_bias(in_channels, out_channels, 3, cfg, vb.pp("conv"))?;
        let norm = instance_norm(out_channels, vb.pp("norm"))?;
        Ok(Self { conv, norm })
    }
}

impl Module for ConvBlock {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        leaky_relu(&self.norm.forward(&self.conv.forward(xs)?)?, LRELU_SLOPE)
    }
}

/// Depthwise 3x3 -> pointwise 1x1 -> instance norm -> LeakyReLU(0.2)
#[derive(Debug)]
pub struct SeparableConv2d {
    depthwise: Conv2d,
    pointwise: Conv2d,
    norm: GroupNorm,
}

impl SeparableConv2d {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let dw_cfg = Conv2dConfig {
            padding: 1,
            stride,
            groups: in_channels,
            ..Default::default()
        };
        let depthwise = conv2d_no_bias(in_channels, in_channels, 3, dw_cfg, vb.pp("depthwise"))?;
        let pointwise = conv2d_no_bias(
            in_channels,
            out_channels,
            1,
            Conv2dConfig::default(),
            vb.pp("pointwise"),
        )?;
        let norm = instance_norm(out_channels, vb.pp("norm"))?;
        Ok(Self {
            depthwise,
            pointwise,
            norm,
        })
    }
}

impl Module for SeparableConv2d {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let out = self.pointwise.forward(&self.depthwise.forward(xs)?)?;
        leaky_relu(&self.norm.forward(&out)?, LRELU_SLOPE)
    }
}

/// Halve the spatial dims: a stride-2 separable conv summed with a stride-1
/// separable conv of the pooled input.
#[derive(Debug)]
pub struct DownConv {
    strided: SeparableConv2d,
    pooled: SeparableConv2d,
}

impl DownConv {
    pub fn new(channels: usize, vb: VarBuilder) -> Result<Self> {
        let strided = SeparableConv2d::new(channels, channels, 2, vb.pp("strided"))?;
        let pooled = SeparableConv2d::new(channels, channels, 1, vb.pp("pooled"))?;
        Ok(Self { strided, pooled })
    }
}

impl Module for DownConv {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let strided = self.strided.forward(xs)?;
        let pooled = self.pooled.forward(&xs.avg_pool2d(2)?)?;
        strided + pooled
    }
}

/// Double the spatial dims: 2x upsample followed by a separable conv.
#[derive(Debug)]
pub struct UpConv {
    conv: SeparableConv2d,
}

impl UpConv {
    pub fn new(channels: usize, vb: VarBuilder) -> Result<Self> {
        let conv = SeparableConv2d::new(channels, channels, 1, vb.pp("conv"))?;
        Ok(Self { conv })
    }
}

impl Module for UpConv {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (_, _, h, w) = xs.dims4()?;
        self.conv.forward(&xs.upsample_nearest2d(h * 2, w * 2)?)
    }
}

/// MobileNet-style inverted residual: 1x1 expand (x2) -> depthwise 3x3 ->
/// 1x1 project, with a residual add when the widths match.
#[derive(Debug)]
pub struct InvertedResBlock {
    expand: Conv2d,
    expand_norm: GroupNorm,
    depthwise: Conv2d,
    depthwise_norm: GroupNorm,
    project: Conv2d,
    project_norm: GroupNorm,
    residual: bool,
}

impl InvertedResBlock {
    pub fn new(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Self> {
        let hidden = in_channels * 2;

        let expand = conv2d_no_bias(
            in_channels,
            hidden,
            1,
            Conv2dConfig::default(),
            vb.pp("expand"),
        )?;
        let expand_norm = instance_norm(hidden, vb.pp("expand_norm"))?;

        let dw_cfg = Conv2dConfig {
            padding: 1,
            groups: hidden,
            ..Default::default()
        };
        let depthwise = conv2d_no_bias(hidden, hidden, 3, dw_cfg, vb.pp("depthwise"))?;
        let depthwise_norm = instance_norm(hidden, vb.pp("depthwise_norm"))?;

        let project = conv2d_no_bias(
            hidden,
            out_channels,
            1,
            Conv2dConfig::default(),
            vb.pp("project"),
        )?;
        let project_norm = instance_norm(out_channels, vb.pp("project_norm"))?;

        Ok(Self {
            expand,
            expand_norm,
            depthwise,
            depthwise_norm,
            project,
            project_norm,
            residual: in_channels == out_channels,
        })
    }
}

impl Module for InvertedResBlock {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let out = self.expand.forward(xs)?;
        let out = leaky_relu(&self.expand_norm.forward(&out)?, LRELU_SLOPE)?;
        let out = self.depthwise.forward(&out)?;
        let out = leaky_relu(&self.depthwise_norm.forward(&out)?, LRELU_SLOPE)?;
        let out = self.project_norm.forward(&self.project.forward(&out)?)?;

        if self.residual {
            xs + out
        } else {
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};

    fn test_vb(varmap: &VarMap) -> VarBuilder<'_> {
        VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu)
    }

    #[test]
    fn test_conv_block_shape() {
        let varmap = VarMap::new();
        let block = ConvBlock::new(3, 8, test_vb(&varmap)).unwrap();

        let xs = Tensor::zeros((1, 3, 16, 16), DType::F32, &Device::Cpu).unwrap();
        let out = block.forward(&xs).unwrap();
        assert_eq!(out.dims(), [1, 8, 16, 16]);
    }

    #[test]
    fn test_down_conv_halves() {
        let varmap = VarMap::new();
        let block = DownConv::new(4, test_vb(&varmap)).unwrap();

        let xs = Tensor::zeros((1, 4, 16, 16), DType::F32, &Device::Cpu).unwrap();
        let out = block.forward(&xs).unwrap();
        assert_eq!(out.dims(), [1, 4, 8, 8]);
    }

    #[test]
    fn test_up_conv_doubles() {
        let varmap = VarMap::new();
        let block = UpConv::new(4, test_vb(&varmap)).unwrap();

        let xs = Tensor::zeros((1, 4, 8, 8), DType::F32, &Device::Cpu).unwrap();
        let out = block.forward(&xs).unwrap();
        assert_eq!(out.dims(), [1, 4, 16, 16]);
    }

    #[test]
    fn test_inverted_res_block_shapes() {
        let varmap = VarMap::new();
        let same = InvertedResBlock::new(8, 8, test_vb(&varmap)).unwrap();
        let xs = Tensor::zeros((2, 8, 8, 8), DType::F32, &Device::Cpu).unwrap();
        assert_eq!(same.forward(&xs).unwrap().dims(), [2, 8, 8, 8]);

        let widen_map = VarMap::new();
        let widen = InvertedResBlock::new(8, 12, test_vb(&widen_map)).unwrap();
        assert_eq!(widen.forward(&xs).unwrap().dims(), [2, 12, 8, 8]);
    }
}
