use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use gofwtool_rs::{pack_firmware, unpack_firmware, Firmware};
use std::path::Path;

#[derive(Parser)]
#[command(name = "gofwtool-rs")]
#[command(about = "A Rust tool for validating, unpacking and packing Insta360 GO 2 and GO 3 firmware images")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Validate {
        #[arg(short, long, help = "Path to the firmware file (.pkg)")]
        input: String,
    },

    Unpack {
        #[arg(short, long, help = "Path to the firmware file (.pkg)")]
        input: String,

        #[arg(short, long, help = "Directory where extracted files will be saved")]
        output: String,
    },

    Pack {
        #[arg(short, long, help = "Directory with the unpacked firmware")]
        input: String,

        #[arg(short, long, help = "Output firmware file path")]
        output: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Validate { input } => {
            check_input(&input)?;
            let firmware = Firmware::open(&input)?;
            firmware.validate()?;
        }
        Commands::Unpack { input, output } => {
            check_input(&input)?;
            check_output(&output)?;
            let firmware = Firmware::open(&input)?;
            unpack_firmware(&firmware, &output)?;
        }
        Commands::Pack { input, output } => {
            check_input(&input)?;
            check_output(&output)?;
            pack_firmware(&input, &output)?;
        }
    }

    Ok(())
}

fn check_input(input: &str) -> Result<()> {
    if !Path::new(input).exists() {
        bail!("Input {} does not exist", input);
    }
    Ok(())
}

fn check_output(output: &str) -> Result<()> {
    if Path::new(output).exists() {
        bail!("Output {} already exists", output);
    }
    Ok(())
}
