//! Toonshift CLI - image-to-animation style transfer
//!
//! Applies a pretrained generator to single images, directories of images,
//! or video files.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use toonshift_pipeline::Transformer;
use toonshift_weights::{WeightCache, WeightSource};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

/// Toonshift - turn photos and footage into animation-styled frames
#[derive(Parser)]
#[command(name = "toonshift")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pretrained style name (hayao, shinkai) or path to a weight file
    #[arg(short, long, default_value = "hayao", global = true)]
    weight: String,

    /// Directory for downloaded weights (defaults to the platform cache dir)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform a single image into a PNG
    Image {
        /// Input image file
        input: PathBuf,

        /// Output file (must end in .png)
        output: PathBuf,
    },

    /// Transform every recognized image in a directory
    Dir {
        /// Source directory
        src: PathBuf,

        /// Destination directory (created if absent)
        dest: PathBuf,

        /// Process at most this many images
        #[arg(long)]
        max_images: Option<usize>,

        /// Square size every image is resized to before the forward pass
        #[arg(long, default_value = "512")]
        img_size: u32,
    },

    /// Transform a video, copying its audio track
    Video {
        /// Input video file
        input: PathBuf,

        /// Output video file
        output: PathBuf,

        /// Frames per forward pass
        #[arg(short, long, default_value = "4")]
        batch_size: usize,

        /// Trim start, in seconds
        #[arg(long)]
        start: Option<f64>,

        /// Trim end, in seconds
        #[arg(long)]
        end: Option<f64>,

        /// Encode to a local temp file, then move into place
        #[arg(long)]
        stage_locally: bool,
    },

    /// List bundled pretrained styles and their cache status
    Styles,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(!cli.no_color)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cache = match &cli.cache_dir {
        Some(dir) => WeightCache::new(dir),
        None => WeightCache::new(WeightCache::default_dir()),
    };

    match cli.command {
        Commands::Image { input, output } => {
            let transformer = load_transformer(&cli.weight, &cache)?;
            commands::image::run(&transformer, &input, &output)?;
        }

        Commands::Dir {
            src,
            dest,
            max_images,
            img_size,
        } => {
            let transformer = load_transformer(&cli.weight, &cache)?;
            commands::dir::run(&transformer, &src, &dest, max_images, img_size)?;
        }

        Commands::Video {
            input,
            output,
            batch_size,
            start,
            end,
            stage_locally,
        } => {
            let transformer = load_transformer(&cli.weight, &cache)?;
            commands::video::run(
                &transformer,
                &input,
                &output,
                batch_size,
                start,
                end,
                stage_locally,
            )?;
        }

        Commands::Styles => {
            commands::styles::run(&cache);
        }
    }

    Ok(())
}

fn load_transformer(
    weight: &str,
    cache: &WeightCache,
) -> Result<Transformer, toonshift_pipeline::PipelineError> {
    let source = WeightSource::parse(weight);
    Transformer::new(&source, cache)
}
