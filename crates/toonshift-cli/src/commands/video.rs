//! Video transformation command

use std::path::Path;
use toonshift_pipeline::{PipelineError, Transformer, VideoOptions};

#[allow(clippy::too_many_arguments)]
pub fn run(
    transformer: &Transformer,
    input: &Path,
    output: &Path,
    batch_size: usize,
    start: Option<f64>,
    end: Option<f64>,
    stage_locally: bool,
) -> Result<(), PipelineError> {
    let options = VideoOptions {
        batch_size,
        start,
        end,
        stage_locally,
    };
    let frames = transformer.transform_video(input, output, &options)?;
    println!(
        "Animation video saved to {} ({} frames)",
        output.display(),
        frames
    );
    Ok(())
}
