// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{crate_version, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use spheringer::config::SamplerConfig;
use spheringer::midi;
use spheringer::render::{self, OfflineRenderer};
use spheringer::samples::Sampler;
use spheringer::util::duration_seconds_millis;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI-triggered sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Loads a sample folder and lists the keys it provides.
    Keys {
        /// The path to the sample folder.
        library_path: PathBuf,
        /// The path to the sampler config.
        #[arg[short, long]]
        config: Option<PathBuf>,
    },
    /// Renders a MIDI file through a sample folder to a WAV file.
    Render {
        /// The path to the sample folder.
        library_path: PathBuf,
        /// The MIDI file providing Note On/Note Off events.
        midi_file: PathBuf,
        /// The WAV file to write.
        output: PathBuf,
        /// The path to the sampler config.
        #[arg[short, long]]
        config: Option<PathBuf>,
        /// Output volume in dB. Overrides the config.
        #[arg(long, allow_negative_numbers = true)]
        volume_db: Option<f32>,
        /// Frames per rendered block. Overrides the config.
        #[arg(long)]
        block_size: Option<usize>,
    },
}

fn load_config(path: Option<&Path>) -> Result<SamplerConfig, Box<dyn Error>> {
    match path {
        Some(path) => Ok(SamplerConfig::deserialize(path)?),
        None => Ok(SamplerConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keys {
            library_path,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let (library, report) = config.loader().load_folder(&library_path)?;

            if library.is_empty() {
                println!("No samples found in {}.", library_path.display());
                return Ok(());
            }

            println!("Keys (count: {}):", library.len());
            for key in library.keys() {
                if let Some(recording) = library.get(key) {
                    println!(
                        "- {}: {} ({} channels, {})",
                        key,
                        recording.name(),
                        recording.channel_count(),
                        duration_seconds_millis(recording.duration())
                    );
                }
            }

            if !report.skipped_names.is_empty() || !report.failed.is_empty() {
                println!(
                    "\nSkipped: {} without a note number, {} failed to decode.",
                    report.skipped_names.len(),
                    report.failed.len()
                );
            }
        }
        Commands::Render {
            library_path,
            midi_file,
            output,
            config,
            volume_db,
            block_size,
        } => {
            let config = load_config(config.as_deref())?;
            let mut settings = config.settings()?;
            if let Some(volume_db) = volume_db {
                settings.volume_db = volume_db;
            }
            let block_size = block_size.unwrap_or(config.block_size());
            if block_size == 0 {
                return Err("block size must be greater than zero".into());
            }

            let (handle, mut processor) = Sampler::new(&settings);
            let report = handle.load_folder(&config.loader(), &library_path)?;
            info!(
                loaded = report.loaded,
                skipped = report.skipped_names.len(),
                failed = report.failed.len(),
                "Sample folder loaded"
            );

            let sample_rate = handle.sample_rate();
            let events = midi::read_trigger_events(&midi_file, sample_rate)?;
            let renderer = OfflineRenderer::new(block_size, config.output_channels().into());
            let channels = renderer.render(&mut processor, &events);
            render::write_wav(&output, &channels, sample_rate)?;

            let frames = channels.first().map(|c| c.len()).unwrap_or(0);
            println!(
                "Rendered {} events, {} frames to {}.",
                events.len(),
                frames,
                output.display()
            );
        }
    }

    Ok(())
}
