//! The style-transfer generator

use crate::blocks::{ConvBlock, DownConv, InvertedResBlock, SeparableConv2d, UpConv};
use crate::error::ModelError;
use candle_core::{DType, Device, Tensor};
use candle_nn::{conv2d_no_bias, seq, Conv2dConfig, Module, Sequential, VarBuilder};
use std::path::Path;
use tracing::debug;

/// Number of inverted residual blocks in the bottleneck.
const RES_BLOCKS: usize = 8;

/// Fixed-topology image-to-animation generator.
///
/// Encoder: 3 -> 64 -> 128 -> (down) -> 128 -> 256 -> (down) -> 256.
/// Bottleneck: eight inverted residual blocks at width 256.
/// Decoder mirrors the encoder back to 3 channels with a final 1x1 conv and
/// tanh, so outputs live in `(-1, 1)`.
///
/// The two down/up stages mean any input whose sides are multiples of 4 comes
/// back at its original resolution.
pub struct Generator {
    encode_blocks: Sequential,
    res_blocks: Sequential,
    decode_blocks: Sequential,
}

impl Generator {
    pub fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        let enc = vb.pp("encode_blocks");
        let encode_blocks = seq()
            .add(ConvBlock::new(3, 64, enc.pp("0"))?)
            .add(ConvBlock::new(64, 128, enc.pp("1"))?)
            .add(DownConv::new(128, enc.pp("2"))?)
            .add(ConvBlock::new(128, 128, enc.pp("3"))?)
            .add(SeparableConv2d::new(128, 256, 1, enc.pp("4"))?)
            .add(DownConv::new(256, enc.pp("5"))?)
            .add(ConvBlock::new(256, 256, enc.pp("6"))?);

        let res = vb.pp("res_blocks");
        let mut res_blocks = seq();
        for i in 0..RES_BLOCKS {
            res_blocks = res_blocks.add(InvertedResBlock::new(256, 256, res.pp(i.to_string()))?);
        }

        let dec = vb.pp("decode_blocks");
        let decode_blocks = seq()
            .add(ConvBlock::new(256, 128, dec.pp("0"))?)
            .add(UpConv::new(128, dec.pp("1"))?)
            .add(SeparableConv2d::new(128, 128, 1, dec.pp("2"))?)
            .add(ConvBlock::new(128, 128, dec.pp("3"))?)
            .add(UpConv::new(128, dec.pp("4"))?)
            .add(ConvBlock::new(128, 64, dec.pp("5"))?)
            .add(ConvBlock::new(64, 64, dec.pp("6"))?)
            .add(conv2d_no_bias(
                64,
                3,
                1,
                Conv2dConfig::default(),
                dec.pp("7"),
            )?)
            .add_fn(|xs| xs.tanh());

        Ok(Self {
            encode_blocks,
            res_blocks,
            decode_blocks,
        })
    }
}

impl Module for Generator {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let out = self.encode_blocks.forward(xs)?;
        let out = self.res_blocks.forward(&out)?;
        self.decode_blocks.forward(&out)
    }
}

/// Build a generator from a weight file.
///
/// `.safetensors` files map straight onto the parameter names above.
/// Pretrained PyTorch `.pth` bundles are tried first with the
/// `model_state_dict` prefix their checkpoints nest parameters under, then as
/// a bare state dict. Any parameter the network needs that the file does not
/// supply fails the whole load.
pub fn generator_from_file(path: impl AsRef<Path>, device: &Device) -> Result<Generator, ModelError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ModelError::CheckpointNotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("pth") | Some("pt") => {
            let vb = VarBuilder::from_pth(path, DType::F32, device)
                .map_err(|source| ModelError::StrictLoad {
                    path: path.to_path_buf(),
                    source,
                })?;
            debug!(path = %path.display(), "loading PyTorch weight bundle");
            Generator::new(vb.pp("model_state_dict")).or_else(|_| {
                let vb = VarBuilder::from_pth(path, DType::F32, device)?;
                Generator::new(vb)
            }).map_err(|source| ModelError::StrictLoad {
                path: path.to_path_buf(),
                source,
            })
        }
        Some("safetensors") => {
            let vb = unsafe {
                VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device).map_err(
                    |source| ModelError::StrictLoad {
                        path: path.to_path_buf(),
                        source,
                    },
                )?
            };
            debug!(path = %path.display(), "loading safetensors weights");
            Generator::new(vb).map_err(|source| ModelError::StrictLoad {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => Err(ModelError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;

    #[test]
    fn test_generator_preserves_shape() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let generator = Generator::new(vb).unwrap();

        let xs = Tensor::zeros((1, 3, 32, 32), DType::F32, &device).unwrap();
        let out = generator.forward(&xs).unwrap();
        assert_eq!(out.dims(), [1, 3, 32, 32]);
    }

    #[test]
    fn test_generator_output_bounded() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let generator = Generator::new(vb).unwrap();

        let xs = Tensor::rand(-1f32, 1f32, (1, 3, 32, 32), &device).unwrap();
        let out = generator.forward(&xs).unwrap();
        let flat = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(flat.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_missing_weight_file() {
        let err = generator_from_file("/nonexistent/generator_hayao.pth", &Device::Cpu);
        assert!(matches!(err, Err(ModelError::CheckpointNotFound(_))));
    }

    #[test]
    fn test_unsupported_weight_format() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("weights.onnx");
        std::fs::write(&path, b"not weights").unwrap();

        let err = generator_from_file(&path, &Device::Cpu);
        assert!(matches!(err, Err(ModelError::UnsupportedFormat(_))));
    }
}
