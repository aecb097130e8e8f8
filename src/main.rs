// ABOUTME: Main entry point for the hero-panel program.
// ABOUTME: Provides CLI interface and executes commands from the library.

use clap::{Args, Parser, Subcommand};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hero_panel::config::Config;
use hero_panel::contact;
use hero_panel::server::{self, ServerContext, IMAGES_PREFIX};
use hero_panel::watch::{self, WatchConfig};
use hero_panel::{
    find_images, generate_page, write_html_to_file, FetchingLoader, ImageLoader, ImageSet,
    PanelError, PanelHandle, Simulation,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a static HTML page of the panel
    Render(RenderArgs),

    /// Serve the live panel, its images and the contact endpoint
    Serve(ServeArgs),

    /// Show which contact email settings are present
    EmailConfig,
}

#[derive(Args)]
struct ForegroundArgs {
    /// HTML shown above the images
    #[arg(long)]
    foreground: Option<String>,

    /// File holding the HTML shown above the images
    #[arg(long, conflicts_with = "foreground")]
    foreground_file: Option<PathBuf>,

    /// Page title
    #[arg(long, default_value = "Hero")]
    title: String,

    /// Rotation interval in milliseconds; zero or negative disables rotation
    #[arg(long, allow_hyphen_values = true)]
    interval: Option<i64>,
}

#[derive(Args)]
struct RenderArgs {
    /// Image URLs or paths, in display order
    #[arg(long, value_delimiter = ',', conflicts_with = "dir")]
    images: Option<Vec<String>>,

    /// Directory to take the images from
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Glob pattern for images in the directory
    #[arg(long)]
    pattern: Option<String>,

    /// URL prefix the page uses for directory images
    #[arg(long, default_value = "images")]
    url_prefix: String,

    /// Path to output HTML file
    #[arg(short, long)]
    output: PathBuf,

    /// Number of rotation periods to run before rendering
    #[arg(long, default_value_t = 0)]
    tick: usize,

    #[command(flatten)]
    foreground: ForegroundArgs,
}

#[derive(Args)]
struct ServeArgs {
    /// Directory holding the panel images
    #[arg(short, long)]
    dir: PathBuf,

    /// Glob pattern for images in the directory
    #[arg(long)]
    pattern: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Reload the image set when the directory changes
    #[arg(short, long)]
    watch: bool,

    /// Debounce time for file changes in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    #[command(flatten)]
    foreground: ForegroundArgs,
}

fn read_foreground(args: &ForegroundArgs) -> Result<String, PanelError> {
    match (&args.foreground, &args.foreground_file) {
        (Some(html), _) => Ok(html.clone()),
        (None, Some(path)) => {
            hero_panel::utils::validate_file_exists(path)?;
            let html = fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read foreground file: {}", e))?;
            Ok(html)
        }
        (None, None) => Ok(String::new()),
    }
}

fn make_loader(config: &Config) -> Result<Arc<dyn ImageLoader>, PanelError> {
    let loader = FetchingLoader::new(Duration::from_millis(config.load_timeout_ms))?;
    Ok(Arc::new(loader))
}

fn render(args: &RenderArgs, config: &Config) -> Result<(), PanelError> {
    let images = match (&args.images, &args.dir) {
        (Some(references), _) => ImageSet::from_references(references),
        (None, Some(dir)) => {
            let pattern = args.pattern.as_deref().unwrap_or(&config.image_pattern);
            match find_images(dir, pattern, &args.url_prefix) {
                Ok(sources) => ImageSet::new(sources),
                Err(PanelError::NoImagesFoundError(_)) => ImageSet::default(),
                Err(e) => return Err(e),
            }
        }
        (None, None) => ImageSet::default(),
    };
    let foreground = read_foreground(&args.foreground)?;

    let panel_config = config.get_panel_config(args.foreground.interval);
    let mut sim = Simulation::mount(images, panel_config, make_loader(config)?);
    sim.settle();
    sim.run_ticks(args.tick);

    let snapshot = sim.snapshot();
    let page = generate_page(
        &snapshot,
        &args.foreground.title,
        &foreground,
        &config.get_render_options(),
        None,
    );
    write_html_to_file(&page, &args.output)?;

    println!(
        "Rendered {} of {} images loaded: {:?}",
        snapshot.loaded.len(),
        snapshot.layers.len(),
        args.output
    );
    Ok(())
}

fn serve(args: &ServeArgs, config: &Config) -> Result<(), PanelError> {
    hero_panel::utils::validate_directory_exists(&args.dir)?;
    let foreground = read_foreground(&args.foreground)?;

    let watch_config = WatchConfig {
        image_dir: args.dir.clone(),
        pattern: args
            .pattern
            .clone()
            .unwrap_or_else(|| config.image_pattern.clone()),
        url_prefix: IMAGES_PREFIX.to_string(),
        debounce_ms: args.debounce_ms.unwrap_or(config.debounce_ms),
    };

    let images = watch::scan_image_set(&watch_config)?;
    let panel = PanelHandle::mount(
        images,
        config.get_panel_config(args.foreground.interval),
        make_loader(config)?,
    );

    let ctx = ServerContext {
        panel: panel.reader(),
        image_dir: Some(args.dir.clone()),
        title: args.foreground.title.clone(),
        foreground,
        render: config.get_render_options(),
        poll_interval_ms: config.poll_interval_ms,
        contact: config.contact.clone(),
        sink: contact::sink_from_config(&config.contact),
    };
    let port = args.port.unwrap_or(config.port);
    let running = server::start_server(ctx, port)?;

    if args.watch {
        watch::watch_images(&watch_config, &panel)?;
    } else {
        info!("Press Ctrl+C to stop");
        running.join()?;
    }

    panel.unmount();
    Ok(())
}

fn email_config(config: &Config) -> Result<(), PanelError> {
    let report = contact::config_report(&config.contact);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let result = match &cli.command {
        Some(Commands::Render(args)) => {
            println!("Executing render command...");
            render(args, &config)
        }
        Some(Commands::Serve(args)) => {
            println!("Executing serve command...");
            serve(args, &config)
        }
        Some(Commands::EmailConfig) => email_config(&config),
        None => {
            println!("No command specified. Use --help for usage information.");
            Ok(())
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
