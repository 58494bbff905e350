//! Directory batch command

use std::path::Path;
use toonshift_pipeline::{DirOptions, PipelineError, Transformer};

pub fn run(
    transformer: &Transformer,
    src: &Path,
    dest: &Path,
    max_images: Option<usize>,
    img_size: u32,
) -> Result<(), PipelineError> {
    let options = DirOptions {
        max_images,
        img_size: (img_size, img_size),
    };
    let processed = transformer.transform_in_dir(src, dest, &options)?;
    println!(
        "Transformed {} image(s) into {}",
        processed,
        dest.display()
    );
    Ok(())
}
