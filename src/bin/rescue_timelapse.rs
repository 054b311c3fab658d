use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use timelapse_rescue::{recover_file, RecoveryOptions, RecoveryReport};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!(
            "Usage: {} <broken_file.mp4> [output_file.mp4]",
            program_name(&args)
        );
        println!("Recovers Snapmaker U1 timelapse videos.");
        return ExitCode::FAILURE;
    }

    let input = PathBuf::from(&args[1]);
    let output = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| default_output(&input));

    match recover_file(&input, &output, &RecoveryOptions::from_env()) {
        Ok(report) => {
            print_summary(&report, &output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Recovery failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn program_name(args: &[String]) -> &str {
    args.first().map_or("rescue_timelapse", String::as_str)
}

/// `<stem>_fixed.mp4` next to the input
fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recovered".to_string());
    input.with_file_name(format!("{}_fixed.mp4", stem))
}

fn print_summary(report: &RecoveryReport, output: &Path) {
    println!("Recovered {} NAL units into {}", report.units, output.display());
    println!(
        "  frames: {} ({} IDR), stream size: {} bytes",
        report.counts.video_frames(),
        report.counts.idr,
        report.stream_bytes
    );
    if report.is_partial() {
        println!("  partial recovery: {:?}", report.stop);
    }
}
