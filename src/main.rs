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
use std::fs;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};

use sampledeck::audio::{codec, device};
use sampledeck::bank::DEFAULT_SAMPLE_RATE;
use sampledeck::sequence;
use sampledeck::storage::BoardFile;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sample pad engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Prints information about an audio file.
    Info {
        /// The path to the audio file.
        path: PathBuf,
    },
    /// Renders a board's recorded sequence to a WAV file.
    Render {
        /// The path to the board JSON file.
        board: PathBuf,
        /// The path to write the rendered WAV to.
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = device::list_output_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Info { path } => {
            let bytes = fs::read(&path)?;
            let extension = path.extension().and_then(|e| e.to_str());
            let buffer = codec::decode(&bytes, extension)?;

            println!("{}:", path.display());
            println!("- channels: {}", buffer.channel_count());
            println!("- sample rate: {} Hz", buffer.sample_rate());
            println!("- frames: {}", buffer.frame_count());
            println!("- duration: {:.2}s", buffer.duration_secs());
        }
        Commands::Render { board, output } => {
            let board = BoardFile::from_json(&fs::read_to_string(&board)?)?;
            let sequence_data = match &board.sequence {
                Some(sequence) => sequence.clone(),
                None => return Err("board file contains no recorded sequence".into()),
            };

            let bank = board.to_bank(DEFAULT_SAMPLE_RATE);
            let rendered = sequence::render(&sequence_data, &bank);
            let bytes = codec::encode(&rendered)?;
            fs::write(&output, &bytes)?;

            println!(
                "Rendered {} events ({:.2}s) to {}",
                sequence_data.len(),
                rendered.duration_secs(),
                output.display()
            );
        }
    }

    Ok(())
}
