//! Convert the audio of a media file to MP3 or WAV.
//!
//! Usage:
//!   cargo run --example convert -- <input_file> [mp3|wav]
//!
//! Set `RUST_LOG=resound=debug` to see the pipeline's log output.

use std::{error::Error, sync::Arc};

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use resound::{AudioFormat, ConvertOptions, Converter, MediaSource, ProgressInfo};

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    resound::ffmpeg::set_log_level(log::max_level());

    let mut args = std::env::args().skip(1);
    let input_path = args.next().unwrap_or_else(|| "input.mp4".to_string());
    let format: AudioFormat = args.next().as_deref().unwrap_or("mp3").parse()?;

    let progress_bar = ProgressBar::new(100);
    progress_bar.set_style(
        ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos:>3}% {msg}")?
            .progress_chars("##-"),
    );
    let bar = progress_bar.clone();
    let options = ConvertOptions::new().with_progress(Arc::new(move |info: &ProgressInfo| {
        bar.set_position(u64::from(info.percentage));
        bar.set_message(format!("{:?}", info.stage));
    }));

    let source = MediaSource::open(&input_path)?;
    let converter = Converter::with_ffmpeg(options)?;
    println!(
        "{} {}",
        "strategies:".bold(),
        converter
            .available_strategies()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(converter.convert(&source, format));

    match result {
        Ok(audio) => {
            progress_bar.finish_with_message("done");
            std::fs::write(audio.file_name(), audio.bytes())?;
            println!(
                "{} {}",
                "saved".green().bold(),
                format!("{} ({} bytes, {})", audio.file_name(), audio.len(), audio.mime_type())
                    .green()
            );
            Ok(())
        }
        Err(error) => {
            progress_bar.abandon_with_message("failed");
            if let Some(cause) = error.source() {
                log::debug!("Cause: {cause}");
            }
            Err(error.into())
        }
    }
}
