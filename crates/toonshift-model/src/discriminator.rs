//! The adversarial discriminator (training only)

use crate::blocks::ConvBlock;
use candle_core::{Result, Tensor};
use candle_nn::ops::leaky_relu;
use candle_nn::{conv2d_no_bias, seq, Conv2dConfig, Module, Sequential, VarBuilder};

/// Discriminator topology knobs.
///
/// The defaults reproduce the published training setup: a 32-channel stem and
/// three stride-2 stages, each quadrupling the width.
#[derive(Debug, Clone)]
pub struct DiscriminatorConfig {
    pub base_channels: usize,
    pub d_layers: usize,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            base_channels: 32,
            d_layers: 3,
        }
    }
}

/// Patch discriminator scoring realness per spatial region.
///
/// Never used at inference time; it exists so checkpoints produced by a
/// training run deserialize against the same definition they were saved from.
pub struct Discriminator {
    layers: Sequential,
}

impl Discriminator {
    pub fn new(config: &DiscriminatorConfig, vb: VarBuilder) -> Result<Self> {
        let mut channels = config.base_channels;

        let stem_cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let mut layers = seq()
            .add(conv2d_no_bias(3, channels, 3, stem_cfg, vb.pp("stem"))?)
            .add_fn(|xs| leaky_relu(xs, 0.2));

        for i in 0..config.d_layers {
            let stage = vb.pp(format!("stage_{i}"));
            let down_cfg = Conv2dConfig {
                padding: 1,
                stride: 2,
                ..Default::default()
            };
            layers = layers
                .add(conv2d_no_bias(
                    channels,
                    channels * 2,
                    3,
                    down_cfg,
                    stage.pp("down"),
                )?)
                .add_fn(|xs| leaky_relu(xs, 0.2))
                .add(ConvBlock::new(channels * 2, channels * 4, stage.pp("widen"))?);
            channels *= 4;
        }

        let layers = layers
            .add(ConvBlock::new(channels, channels, vb.pp("post"))?)
            .add(conv2d_no_bias(
                channels,
                1,
                3,
                Conv2dConfig {
                    padding: 1,
                    ..Default::default()
                },
                vb.pp("head"),
            )?);

        Ok(Self { layers })
    }
}

impl Module for Discriminator {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.layers.forward(xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_discriminator_patch_output() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let config = DiscriminatorConfig {
            base_channels: 8,
            d_layers: 2,
        };
        let disc = Discriminator::new(&config, vb).unwrap();

        let xs = Tensor::zeros((1, 3, 32, 32), DType::F32, &device).unwrap();
        let out = disc.forward(&xs).unwrap();
        // Two stride-2 stages: 32 -> 8 spatially, one realness channel.
        assert_eq!(out.dims(), [1, 1, 8, 8]);
    }
}
