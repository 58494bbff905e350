//! The Transformer: generator + pre/postprocessing + I/O orchestration

use crate::error::PipelineError;
use crate::video::{probe, FrameReader, FrameWriter, VideoError};
use candle_core::{Device, Module};
use std::path::{Path, PathBuf};
use toonshift_core::{
    batch_to_tensor, is_supported_image, read_image, tensor_to_frames, CoreError, RgbFrame,
};
use toonshift_model::{generator_from_file, select_device, Generator};
use toonshift_weights::{WeightCache, WeightSource};
use tracing::{debug, error, info};

/// Knobs for [`Transformer::transform_in_dir`].
#[derive(Debug, Clone)]
pub struct DirOptions {
    /// Process at most this many images; `None` means all of them.
    pub max_images: Option<usize>,
    /// Every image is resized to this before the forward pass.
    pub img_size: (u32, u32),
}

impl Default for DirOptions {
    fn default() -> Self {
        Self {
            max_images: None,
            img_size: (512, 512),
        }
    }
}

/// Knobs for [`Transformer::transform_video`].
#[derive(Debug, Clone)]
pub struct VideoOptions {
    /// Frames per forward pass.
    pub batch_size: usize,
    /// Trim start, seconds into the source.
    pub start: Option<f64>,
    /// Trim end, seconds into the source.
    pub end: Option<f64>,
    /// Encode into a local temp file and move it into place at the end,
    /// for destinations on slow remote mounts.
    pub stage_locally: bool,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            batch_size: 4,
            start: None,
            end: None,
            stage_locally: false,
        }
    }
}

/// Destination for transformed frames: the ffmpeg encoder in production, an
/// in-memory buffer in tests.
trait FrameSink {
    fn write_frame(&mut self, frame: &RgbFrame) -> Result<(), VideoError>;
}

impl FrameSink for FrameWriter {
    fn write_frame(&mut self, frame: &RgbFrame) -> Result<(), VideoError> {
        FrameWriter::write_frame(self, frame)
    }
}

/// Applies a loaded generator to images, directories, and videos.
pub struct Transformer {
    generator: Generator,
    device: Device,
}

impl Transformer {
    /// Resolve (downloading if needed) and strictly load generator weights.
    pub fn new(source: &WeightSource, cache: &WeightCache) -> Result<Self, PipelineError> {
        let device = select_device()?;
        let weights = cache.resolve(source)?;
        let generator = generator_from_file(&weights, &device)?;
        info!(weights = %weights.display(), "weights loaded, ready to transform");
        Ok(Self { generator, device })
    }

    /// Wrap an already-built generator (custom checkpoints, tests).
    pub fn with_generator(generator: Generator, device: Device) -> Self {
        Self { generator, device }
    }

    /// Run one batch through the network.
    ///
    /// Frames go in as raw RGB and come back the same way; normalization,
    /// channel reordering, and the batch dimension are handled here. All
    /// frames in the batch must share the same dimensions.
    pub fn transform(&self, frames: &[RgbFrame]) -> Result<Vec<RgbFrame>, PipelineError> {
        let batch = batch_to_tensor(frames, &self.device)?;
        // Plain tensors carry no autograd graph, so this is inference-only.
        let out = self.generator.forward(&batch)?;
        Ok(tensor_to_frames(&out)?)
    }

    /// Transform a single image file into a PNG.
    ///
    /// The output path must end in `.png`; anything else is rejected before
    /// the input is even opened.
    pub fn transform_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), PipelineError> {
        let input = input.as_ref();
        let output = output.as_ref();

        let is_png = output
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if !is_png {
            return Err(PipelineError::NonPngOutput(output.to_path_buf()));
        }

        let source = read_image(input)?;
        let (w, h) = source.dimensions();

        let transformed = self
            .transform(&[source.resized(None)])?
            .pop()
            .ok_or(CoreError::EmptyBatch)?;
        transformed.resized(Some((w, h))).save(output)?;

        info!(output = %output.display(), "anime image saved");
        Ok(())
    }

    /// Transform every recognized image in a directory.
    ///
    /// Files with unrecognized extensions are skipped silently. Outputs are
    /// written to `dest` as `<stem>_anime.jpg`, one per input. Returns the
    /// number of images processed.
    pub fn transform_in_dir(
        &self,
        src: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        options: &DirOptions,
    ) -> Result<usize, PipelineError> {
        let src = src.as_ref();
        let dest = dest.as_ref();

        if !src.is_dir() {
            return Err(PipelineError::InputNotFound(src.to_path_buf()));
        }
        std::fs::create_dir_all(dest)?;

        let mut files: Vec<PathBuf> = std::fs::read_dir(src)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_supported_image(p))
            .collect();
        files.sort();
        if let Some(max) = options.max_images {
            files.truncate(max);
        }

        info!(count = files.len(), dir = %src.display(), "found images");

        for (i, path) in files.iter().enumerate() {
            let frame = read_image(path)?.resized(Some(options.img_size));
            let transformed = self
                .transform(&[frame])?
                .pop()
                .ok_or(CoreError::EmptyBatch)?;

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image");
            transformed.save(dest.join(format!("{stem}_anime.jpg")))?;
            debug!(processed = i + 1, total = files.len(), file = %path.display());
        }

        Ok(files.len())
    }

    /// Transform a video, streaming: frames are written to the encoder as
    /// each batch finishes, never buffering the whole clip.
    ///
    /// A failed frame read or per-batch transform is logged and treated as
    /// end-of-stream; frames already handed to the encoder are kept. Returns
    /// the number of frames written.
    pub fn transform_video(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        options: &VideoOptions,
    ) -> Result<u64, PipelineError> {
        let input = input.as_ref();
        let output = output.as_ref();

        if !input.is_file() {
            return Err(PipelineError::InputNotFound(input.to_path_buf()));
        }
        let meta = probe(input)?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Slow remote-mounted destinations take the incremental writes badly;
        // stage through the local temp dir and move once at the end. The temp
        // file removes itself if anything below errors out.
        let staged = options
            .stage_locally
            .then(|| staged_output(output))
            .transpose()?;
        let encode_target = staged.as_ref().map_or(output, |t| t.path());

        info!(
            input = %input.display(),
            frames = meta.frame_estimate(),
            width = meta.width,
            height = meta.height,
            "transforming video"
        );

        let mut reader = FrameReader::open(input, &meta, options.start, options.end)?;
        let mut writer = FrameWriter::create(encode_target, &meta, Some(input))?;

        self.transform_stream(
            std::iter::from_fn(|| reader.next_frame()),
            options.batch_size,
            &mut writer,
        )?;
        drop(reader);

        let written = writer.finish()?;

        if let Some(tmp) = staged {
            if let Err(e) = tmp.persist(output) {
                // Rename across filesystems; copy instead and let the temp
                // file remove itself.
                std::fs::copy(e.file.path(), output)?;
            }
        }

        info!(output = %output.display(), frames = written, "animation video saved");
        Ok(written)
    }

    /// Accumulate frames into fixed-size batches and write each transformed
    /// batch to the sink, flushing the trailing partial batch at the end.
    fn transform_stream<S: FrameSink>(
        &self,
        frames: impl Iterator<Item = RgbFrame>,
        batch_size: usize,
        sink: &mut S,
    ) -> Result<(), PipelineError> {
        let batch_size = batch_size.max(1);
        let mut batch: Vec<RgbFrame> = Vec::with_capacity(batch_size);

        for frame in frames {
            batch.push(frame);
            if batch.len() == batch_size && !self.flush_batch(&mut batch, sink)? {
                return Ok(());
            }
        }
        if !batch.is_empty() {
            self.flush_batch(&mut batch, sink)?;
        }
        Ok(())
    }

    /// Transform and write one accumulated batch. Returns `false` when a
    /// per-batch failure should end the extraction loop.
    fn flush_batch<S: FrameSink>(
        &self,
        batch: &mut Vec<RgbFrame>,
        sink: &mut S,
    ) -> Result<bool, PipelineError> {
        let transformed = match self.transform(batch) {
            Ok(frames) => frames,
            Err(e) => {
                // Per-frame contract: log, keep what was written, stop.
                error!(error = %e, "batch transform failed, stopping extraction");
                batch.clear();
                return Ok(false);
            }
        };
        for frame in &transformed {
            sink.write_frame(frame)?;
        }
        batch.clear();
        Ok(true)
    }
}

/// Uniquely named temp file in the system temp dir, carrying the output's
/// extension so ffmpeg picks the same container format.
fn staged_output(output: &Path) -> std::io::Result<tempfile::NamedTempFile> {
    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    tempfile::Builder::new()
        .prefix("toonshift-stage-")
        .suffix(&format!(".{ext}"))
        .tempfile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::{VarBuilder, VarMap};

    fn test_transformer() -> Transformer {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        Transformer::with_generator(Generator::new(vb).unwrap(), device)
    }

    fn write_test_image(path: &Path, side: u32) {
        let data: Vec<u8> = (0..side * side * 3).map(|i| (i % 256) as u8).collect();
        RgbFrame::new(side, side, data).unwrap().save(path).unwrap();
    }

    #[test]
    fn test_transform_batch_shapes() {
        let t = test_transformer();
        let frame = RgbFrame::new(32, 32, vec![100; 32 * 32 * 3]).unwrap();

        let out = t.transform(&[frame.clone(), frame]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].dimensions(), (32, 32));
    }

    #[test]
    fn test_transform_file_rejects_non_png() {
        let t = test_transformer();
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("photo.jpg");
        write_test_image(&input, 32);

        for bad in ["out.jpg", "out.bmp", "out"] {
            let result = t.transform_file(&input, dir.path().join(bad));
            assert!(matches!(result, Err(PipelineError::NonPngOutput(_))), "{bad}");
        }

        // Extension check is case-insensitive.
        t.transform_file(&input, dir.path().join("out.PNG")).unwrap();
    }

    #[test]
    fn test_transform_file_missing_input() {
        let t = test_transformer();
        let dir = tempfile::TempDir::new().unwrap();
        let result = t.transform_file(dir.path().join("absent.jpg"), dir.path().join("out.png"));
        assert!(matches!(
            result,
            Err(PipelineError::Core(CoreError::Decode { .. }))
        ));
    }

    #[test]
    fn test_transform_file_preserves_dimensions() {
        let t = test_transformer();
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("photo.png");
        // Not a multiple of 32; goes through the snap-resize and back.
        let data: Vec<u8> = vec![50; 40 * 40 * 3];
        RgbFrame::new(40, 40, data).unwrap().save(&input).unwrap();

        let output = dir.path().join("anime.png");
        t.transform_file(&input, &output).unwrap();

        let out = read_image(&output).unwrap();
        assert_eq!(out.dimensions(), (40, 40));
    }

    #[test]
    fn test_transform_in_dir_filters_and_suffixes() {
        let t = test_transformer();
        let dir = tempfile::TempDir::new().unwrap();
        let src = dir.path().join("in");
        let dest = dir.path().join("out");
        std::fs::create_dir(&src).unwrap();

        write_test_image(&src.join("a.jpg"), 16);
        write_test_image(&src.join("b.png"), 16);
        std::fs::write(src.join("notes.txt"), "not an image").unwrap();
        std::fs::write(src.join("clip.mp4"), "not an image either").unwrap();

        let options = DirOptions {
            max_images: None,
            img_size: (32, 32),
        };
        let processed = t.transform_in_dir(&src, &dest, &options).unwrap();
        assert_eq!(processed, 2);

        let mut outputs: Vec<String> = std::fs::read_dir(&dest)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        outputs.sort();
        assert_eq!(outputs, vec!["a_anime.jpg", "b_anime.jpg"]);
    }

    #[test]
    fn test_transform_in_dir_max_images() {
        let t = test_transformer();
        let dir = tempfile::TempDir::new().unwrap();
        let src = dir.path().join("in");
        std::fs::create_dir(&src).unwrap();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            write_test_image(&src.join(name), 16);
        }

        let options = DirOptions {
            max_images: Some(2),
            img_size: (32, 32),
        };
        let processed = t
            .transform_in_dir(&src, dir.path().join("out"), &options)
            .unwrap();
        assert_eq!(processed, 2);
    }

    #[test]
    fn test_transform_in_dir_missing_source() {
        let t = test_transformer();
        let result =
            t.transform_in_dir("/nonexistent/images", "/tmp/out", &DirOptions::default());
        assert!(matches!(result, Err(PipelineError::InputNotFound(_))));
    }

    struct BufferSink {
        frames: Vec<RgbFrame>,
    }

    impl FrameSink for BufferSink {
        fn write_frame(&mut self, frame: &RgbFrame) -> Result<(), VideoError> {
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    fn gray_frame(side: u32) -> RgbFrame {
        RgbFrame::new(side, side, vec![100; (side * side * 3) as usize]).unwrap()
    }

    #[test]
    fn test_stream_batching_even_batches() {
        let t = test_transformer();
        let mut sink = BufferSink { frames: Vec::new() };

        t.transform_stream((0..8).map(|_| gray_frame(32)), 4, &mut sink)
            .unwrap();
        assert_eq!(sink.frames.len(), 8);
        assert_eq!(sink.frames[0].dimensions(), (32, 32));
    }

    #[test]
    fn test_stream_batching_flushes_trailing_partial() {
        let t = test_transformer();
        let mut sink = BufferSink { frames: Vec::new() };

        t.transform_stream((0..5).map(|_| gray_frame(32)), 4, &mut sink)
            .unwrap();
        assert_eq!(sink.frames.len(), 5);

        // A zero batch size degrades to one frame per pass, never a hang.
        let mut one_by_one = BufferSink { frames: Vec::new() };
        t.transform_stream((0..3).map(|_| gray_frame(32)), 0, &mut one_by_one)
            .unwrap();
        assert_eq!(one_by_one.frames.len(), 3);
    }

    #[test]
    fn test_stream_batch_failure_keeps_written_frames() {
        let t = test_transformer();
        let mut sink = BufferSink { frames: Vec::new() };

        // The second batch mixes dimensions, so its transform fails. The
        // stream ends there but the first batch's frames stay written.
        let frames = vec![
            gray_frame(32),
            gray_frame(32),
            gray_frame(32),
            gray_frame(16),
        ];
        t.transform_stream(frames.into_iter(), 2, &mut sink).unwrap();
        assert_eq!(sink.frames.len(), 2);
    }

    #[test]
    fn test_staged_output_unique_and_cleaned() {
        let a = staged_output(Path::new("clip.mp4")).unwrap();
        let b = staged_output(Path::new("clip.mp4")).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().extension().is_some_and(|e| e == "mp4"));

        let path = a.path().to_path_buf();
        drop(a);
        assert!(!path.exists());
    }

    #[test]
    fn test_transform_video_missing_source() {
        let t = test_transformer();
        let result = t.transform_video(
            "/nonexistent/clip.mp4",
            "/tmp/out.mp4",
            &VideoOptions::default(),
        );
        assert!(matches!(result, Err(PipelineError::InputNotFound(_))));
    }
}
