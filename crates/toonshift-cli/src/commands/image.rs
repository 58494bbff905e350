//! Single-image command

use std::path::Path;
use toonshift_pipeline::{PipelineError, Transformer};

pub fn run(transformer: &Transformer, input: &Path, output: &Path) -> Result<(), PipelineError> {
    transformer.transform_file(input, output)?;
    println!("Anime image saved to {}", output.display());
    Ok(())
}
