use clap::{Parser, Subcommand};
use image_manipulate::imaging::{Color, RustEngine, get_dimensions};
use image_manipulate::manipulate::Manipulator;
use image_manipulate::request::{Action, ImageRequest, Options};
use image_manipulate::{config, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("MANIPULATE_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("MANIPULATE_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "image-manipulate")]
#[command(about = "Resize, crop, filter and watermark uploaded images")]
#[command(long_about = "\
Resize, crop, filter and watermark uploaded images

Each run streams one source image through the pipeline and writes the
result to --out:

  1. geometry   one of resize | fit | fill | square | crop (or none)
  2. effects    blur, modulate
  3. strip      metadata is always dropped
  4. write      encode to --out (format from its extension)
  5. watermark  optional overlay, sized from the written image
  6. stat       report the final byte size

Configuration is read from --config, or ./manipulate.toml if present.
Run 'image-manipulate gen-config' to generate a documented manipulate.toml.

Set RUST_LOG=debug to trace every stage.")]
#[command(version = version_string())]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one image through the manipulation pipeline
    Manipulate(ManipulateArgs),
    /// Print the dimensions of an image
    Identify {
        /// Image file to probe
        file: PathBuf,
    },
    /// Print a stock manipulate.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct ManipulateArgs {
    /// Source image
    source: PathBuf,

    /// Where to write the result
    #[arg(long)]
    out: PathBuf,

    /// Upload name used for the decode hint (defaults to the source file name)
    #[arg(long)]
    filename: Option<String>,

    /// Geometry action: resize, fit, fill, square or crop
    #[arg(long)]
    action: Option<Action>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    crop_x: Option<u32>,

    #[arg(long)]
    crop_y: Option<u32>,

    /// Hex background color for `fill`, without a leading '#'
    #[arg(long)]
    bgcolor: Option<Color>,

    /// Encoder quality (defaults to output.default_quality)
    #[arg(long)]
    quality: Option<u32>,

    #[arg(long)]
    blur: bool,

    #[arg(long)]
    blur_radius: Option<f32>,

    #[arg(long)]
    blur_sigma: Option<f32>,

    #[arg(long)]
    modulate: bool,

    /// Brightness in percent (100 = unchanged)
    #[arg(long)]
    brightness: Option<f32>,

    /// Saturation in percent (100 = unchanged)
    #[arg(long)]
    saturation: Option<f32>,

    /// Hue rotation in percent (100 = unchanged, 0 and 200 = half turn)
    #[arg(long)]
    hue: Option<f32>,

    /// Composite the configured watermark over the result
    #[arg(long)]
    watermark: bool,

    /// Config file (defaults to ./manipulate.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the settled request as JSON
    #[arg(long)]
    json: bool,
}

impl ManipulateArgs {
    fn options(&self) -> Options {
        Options {
            action: self.action,
            width: self.width,
            height: self.height,
            crop_x: self.crop_x,
            crop_y: self.crop_y,
            bgcolor: self.bgcolor,
            quality: self.quality,
            blur: self.blur,
            blur_radius: self.blur_radius,
            blur_sigma: self.blur_sigma,
            modulate: self.modulate,
            modulate_brightness: self.brightness,
            modulate_saturation: self.saturation,
            modulate_hue: self.hue,
            watermark: self.watermark,
        }
    }

    fn filename(&self) -> String {
        self.filename.clone().unwrap_or_else(|| {
            self.source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Manipulate(args) => run_manipulate(args).await?,
        Command::Identify { file } => {
            let dims = get_dimensions(&RustEngine::new(), &file)?;
            output::print_identify(&file, dims);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

async fn run_manipulate(args: ManipulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_or_default(args.config.as_deref(), Path::new("."))?;
    let engine = RustEngine::new();
    let orig_dims = get_dimensions(&engine, &args.source)?;
    let img = ImageRequest::new(&args.out, args.filename(), orig_dims, args.options());

    let manipulator = Manipulator::new(engine, config);
    let source = tokio::fs::File::open(&args.source).await?;
    match manipulator.manipulate(img.clone(), source).await {
        Ok(done) if args.json => println!("{}", serde_json::to_string_pretty(&done)?),
        Ok(done) => output::print_result(&done),
        Err(e) => {
            output::print_failure(&img, &e);
            return Err(e.into());
        }
    }
    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
