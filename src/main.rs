mod compositor;
mod config;
mod connection;
mod error;
mod events;
mod scheduler;
mod shm;
mod source;
mod view;
mod visual;
mod window;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;

use config::Config;
use connection::XConnection;
use error::Result;
use source::SourceImage;
use window::ImageWindow;

#[derive(Parser, Debug)]
#[command(name = "xoverlay")]
#[command(about = "Show an image in a borderless, translucent X11 window", long_about = None)]
struct Args {
    /// Image file to show, or `-` to read from stdin
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Initial opacity, clamped to [0, 1]
    #[arg(long, default_value_t = 0.5)]
    opacity: f64,
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        log::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn read_input(input: &Path) -> Result<Vec<u8>> {
    if input == Path::new("-") {
        let mut bytes = Vec::new();
        io::stdin().lock().read_to_end(&mut bytes)?;
        Ok(bytes)
    } else {
        Ok(fs::read(input)?)
    }
}

fn title_for(input: &Path) -> String {
    if input == Path::new("-") {
        return "xoverlay".to_string();
    }
    input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xoverlay".to_string())
}

fn run(args: &Args) -> Result<()> {
    let config = Config::load();
    let opacity = args.opacity.clamp(0.0, 1.0);

    let bytes = read_input(&args.input)?;
    let source = SourceImage::decode(&bytes)?;
    log::info!("Loaded {}x{} image", source.width(), source.height());

    let xconn = XConnection::new()?;
    log::info!("Connected to X server");

    let title = config.title.clone().unwrap_or_else(|| title_for(&args.input));

    let mut overlay = ImageWindow::new(xconn, source, opacity, config);
    let result = overlay
        .create_window(&title)
        .and_then(|()| {
            // Initial draw
            overlay.request_redraw();
            events::run(&mut overlay)
        });

    overlay.close();
    result
}
