// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thermal_camera::backends::camera::CameraPosition;
use thermal_camera::constants::app_info;
use thermal_camera::filters::FilterType;

mod cli;

#[derive(Parser)]
#[command(name = "thermal-camera")]
#[command(about = "Filtered photo and video capture from the command line")]
#[command(version = app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Facing {
    Back,
    Front,
}

impl From<Facing> for CameraPosition {
    fn from(facing: Facing) -> Self {
        match facing {
            Facing::Back => CameraPosition::Back,
            Facing::Front => CameraPosition::Front,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras and microphones
    List,

    /// List available filters
    Filters,

    /// Take a photo
    Photo {
        /// Camera to use
        #[arg(short, long, value_enum, default_value = "back")]
        camera: Facing,

        /// Filter identifier (see 'thermal-camera filters')
        #[arg(short, long)]
        filter: Option<FilterType>,

        /// Output file or directory (default: the media directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record a video
    Video {
        /// Camera to use
        #[arg(short, long, value_enum, default_value = "back")]
        camera: Facing,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Filter identifier (see 'thermal-camera filters')
        #[arg(short, long)]
        filter: Option<FilterType>,

        /// Output directory (default: the media directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Enable audio recording
        #[arg(short, long)]
        audio: bool,
    },

    /// List captured photos and videos
    History {
        /// Only show media captured with this filter
        #[arg(short, long)]
        filter: Option<FilterType>,
    },

    /// Delete a captured photo or video
    Delete {
        /// File name or path
        file: PathBuf,
    },

    /// Show the configuration in effect
    Config {
        /// Write the configuration file, creating it with defaults if absent
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=thermal_camera=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_devices(),
        Commands::Filters => cli::list_filters(),
        Commands::Photo {
            camera,
            filter,
            output,
        } => cli::take_photo(camera.into(), filter, output),
        Commands::Video {
            camera,
            duration,
            filter,
            output,
            audio,
        } => cli::record_video(camera.into(), duration, filter, output, audio),
        Commands::History { filter } => cli::show_history(filter),
        Commands::Delete { file } => cli::delete_file(file),
        Commands::Config { save } => cli::show_config(save),
    }
}
