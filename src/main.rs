use clap::{Parser, Subcommand};
use std::io::Read as _;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use webthumb::acquire::SourceDescriptor;
use webthumb::batch::{self, BatchOptions};
use webthumb::cache::ResponseCache;
use webthumb::config::{self, ServiceConfig};
use webthumb::imaging::{CropRect, ImageFormat, Quality};
use webthumb::output;
use webthumb::serve::{self, ThumbnailService};
use webthumb::transform::{SizeMode, Thumbnailer, TransformRequest};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "webthumb")]
#[command(about = "Thumbnails from local files, image URLs and web pages")]
#[command(long_about = "\
Thumbnails from local files, image URLs and web pages

Sources:
  photo.jpg                        Local file (any format the decoder knows)
  -                                Image bytes on stdin
  https://host/logo.png            Remote image (URL mentions an image extension)
  https://host/                    Web page, captured with headless Chrome

A remote image that can't be downloaded is replaced by the configured
placeholder and a warning is printed. A page that doesn't finish loading
in time is captured as far as it got.

Output formats: jpg, png, gif, bmp, tiff.

Run 'webthumb gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (stock defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Flags shared by every command that encodes an image.
#[derive(clap::Args, Clone)]
struct SizeArgs {
    /// Target width in pixels
    #[arg(short = 'W', long)]
    width: u32,

    /// Target height in pixels
    #[arg(short = 'H', long)]
    height: u32,

    /// Output format (defaults to output.default_format)
    #[arg(short, long)]
    format: Option<ImageFormat>,

    /// JPEG quality 1-100 (defaults to output.jpeg_quality)
    #[arg(short, long)]
    quality: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Thumbnail a local file, stdin, or a URL
    Transform {
        /// File path, `-` for stdin, or http(s) URL
        input: String,
        #[command(flatten)]
        size: SizeArgs,
        /// Source region to draw, as x,y,width,height
        #[arg(long)]
        crop: Option<CropRect>,
        /// proportional, fit or exact
        #[arg(long, default_value = "proportional")]
        mode: SizeMode,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Screenshot a web page into a thumbnail
    Capture {
        /// Page URL
        url: String,
        #[command(flatten)]
        size: SizeArgs,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Thumbnail every image under a directory
    Batch {
        /// Input directory
        input: PathBuf,
        #[command(flatten)]
        size: SizeArgs,
        /// proportional, fit or exact
        #[arg(long, default_value = "fit")]
        mode: SizeMode,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Serve GET /getimage over HTTP
    Serve {
        /// Address to listen on (defaults to server.bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config;
    let load_config = || config::load_config(config_path.as_deref());

    match cli.command {
        Command::Transform {
            input,
            size,
            crop,
            mode,
            output: out_file,
        } => {
            let config = load_config()?;
            let source = if input == "-" {
                let mut bytes = Vec::new();
                std::io::stdin().read_to_end(&mut bytes)?;
                SourceDescriptor::Bytes(bytes)
            } else {
                SourceDescriptor::parse(&input)
            };
            let mut request = sized_request(source, &size).with_mode(mode);
            request.crop = crop;
            render_to_file(&config, &request, &out_file)?;
        }
        Command::Capture {
            url,
            size,
            output: out_file,
        } => {
            let config = load_config()?;
            let request = sized_request(SourceDescriptor::Website(url), &size);
            render_to_file(&config, &request, &out_file)?;
        }
        Command::Batch {
            input,
            size,
            mode,
            output: out_dir,
        } => {
            let config = load_config()?;
            init_thread_pool(&config.processing);
            let thumbnailer = Thumbnailer::from_config(&config)?;
            let options = BatchOptions {
                width: size.width,
                height: size.height,
                format: size.format,
                quality: size.quality.map(Quality::new),
                mode,
            };
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = batch::run_batch(&thumbnailer, &input, &out_dir, &options, Some(tx));
            // the sender is dropped with run_batch, so the printer drains and exits
            printer.join().ok();
            let report = result?;
            let report_path = batch::write_report(&report, &out_dir)?;
            println!("{}", output::format_batch_summary(&report));
            println!("Report: {}", report_path.display());
        }
        Command::Serve { bind } => {
            let config = load_config()?;
            let thumbnailer = Thumbnailer::from_config(&config)?;
            let cache = config
                .cache
                .enabled
                .then(|| ResponseCache::new(config.cache.ttl()));
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let service = ThumbnailService::new(thumbnailer, cache)
                .with_max_dimension(config.server.max_dimension);
            serve::serve(service, &bind)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn sized_request(source: SourceDescriptor, size: &SizeArgs) -> TransformRequest {
    let mut request = TransformRequest::new(source, size.width, size.height);
    request.format = size.format;
    request.quality = size.quality.map(Quality::new);
    request
}

fn render_to_file(
    config: &ServiceConfig,
    request: &TransformRequest,
    path: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let thumbnailer = Thumbnailer::from_config(config)?;
    let outcome = thumbnailer.transform(request)?;
    std::fs::write(path, &outcome.value.bytes)?;
    output::print_rendered(
        path,
        &request.source.location(),
        &outcome.value,
        outcome.warning.as_ref(),
    );
    Ok(())
}

/// Log to stderr. `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
