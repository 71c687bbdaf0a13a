use anyhow::{Context, Result, bail};
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::cli::{Cli, Commands, EncodeArgs};
use vcrush::config::Config;
use vcrush::engine::{
    self, BatchPlan, Codec, EncodeOptions, HwAccel, Job, WorkerMessage, build_ffmpeg_cmd,
    estimate_batch_mb, estimate_mb, format_cmd, probe, selected_encoder,
};

/// Encoding settings after merging CLI flags over the config file.
struct Settings {
    codec: Codec,
    crf: u8,
    hw_accel: HwAccel,
    options: EncodeOptions,
    output_dir: Option<PathBuf>,
}

fn resolve_settings(args: &EncodeArgs, config: &Config) -> Result<Settings> {
    let codec_name = args.codec.as_deref().unwrap_or(&config.defaults.codec);
    let codec: Codec = codec_name.parse()?;

    let crf = args.crf.unwrap_or(config.defaults.crf).min(51);

    let hw_name = args.hw_accel.as_deref().unwrap_or(&config.defaults.hw_accel);
    let hw_accel: HwAccel = hw_name.parse().map_err(anyhow::Error::msg)?;

    Ok(Settings {
        codec,
        crf,
        hw_accel,
        options: EncodeOptions {
            stop_grace: Duration::from_secs(config.defaults.stop_grace_secs),
            extra_args: config.defaults.extra_args.clone(),
        },
        output_dir: config.defaults.output_dir.clone(),
    })
}

pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load().unwrap_or_default();

    match cli.command {
        Commands::CheckTools => handle_check_tools(),
        Commands::Probe { file } => handle_probe(file),
        Commands::Estimate { file, encode } => handle_estimate(file, &encode, &config),
        Commands::DryRun {
            input,
            output,
            encode,
        } => handle_dry_run(input, output, &encode, &config),
        Commands::Encode {
            input,
            output,
            encode,
            json,
        } => handle_encode(input, output, &encode, &config, json),
        Commands::Batch {
            directory,
            output_dir,
            encode,
            json,
        } => handle_batch(directory, output_dir, &encode, &config, json),
        Commands::InitConfig => handle_init_config(),
    }
}

fn handle_check_tools() -> Result<()> {
    println!("ffmpeg:  {}", probe::ffmpeg_version()?);
    println!("ffprobe: {}", probe::ffprobe_version()?);
    Ok(())
}

fn handle_probe(file: PathBuf) -> Result<()> {
    let duration = probe::duration_secs(&file)?;
    println!("Duration: {duration:.2}s");
    let bitrate = probe::video_bitrate(&file);
    if bitrate > 0 {
        println!("Bitrate:  {} kb/s", bitrate / 1000);
    } else {
        println!("Bitrate:  unknown");
    }
    Ok(())
}

fn handle_estimate(file: PathBuf, args: &EncodeArgs, config: &Config) -> Result<()> {
    let settings = resolve_settings(args, config)?;
    if !file.exists() {
        bail!("input file not found: {}", file.display());
    }
    let mb = estimate_mb(&file, settings.codec, settings.crf);
    println!(
        "Estimated output size ({}, crf {}): {mb:.1} MB",
        settings.codec, settings.crf
    );
    Ok(())
}

fn handle_dry_run(
    input: PathBuf,
    output: Option<PathBuf>,
    args: &EncodeArgs,
    config: &Config,
) -> Result<()> {
    let settings = resolve_settings(args, config)?;
    let job = Job::new(input, output, settings.codec, settings.crf, settings.hw_accel);
    println!(
        "Encoder: {}",
        selected_encoder(settings.codec, settings.hw_accel)
    );
    println!("{}", format_cmd(&build_ffmpeg_cmd(&job, &settings.options.extra_args)));
    Ok(())
}

fn handle_encode(
    input: PathBuf,
    output: Option<PathBuf>,
    args: &EncodeArgs,
    config: &Config,
    json: bool,
) -> Result<()> {
    let settings = resolve_settings(args, config)?;
    probe::check_tools()?;

    let job = Job::new(input, output, settings.codec, settings.crf, settings.hw_accel);
    let output_path = job.output_path.clone();

    let handle = engine::spawn_job(job, settings.options);
    report_events(&handle.events, json)?;
    handle.join()?;

    if !json {
        println!("Wrote {}", output_path.display());
    }
    Ok(())
}

fn handle_batch(
    directory: PathBuf,
    output_dir: Option<PathBuf>,
    args: &EncodeArgs,
    config: &Config,
    json: bool,
) -> Result<()> {
    let settings = resolve_settings(args, config)?;
    probe::check_tools()?;

    let files = engine::scan(&directory);
    if files.is_empty() {
        bail!("no video files found under {}", directory.display());
    }

    if !json {
        let estimate = estimate_batch_mb(&files, settings.codec, settings.crf);
        println!(
            "{} file(s) to encode, estimated total output: {estimate:.1} MB",
            files.len()
        );
    }

    let output_dir = output_dir.or(settings.output_dir);
    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let plan = BatchPlan::new(files, settings.codec, settings.crf, settings.hw_accel, output_dir);
    let handle = engine::spawn_batch(plan, settings.options);
    report_events(&handle.events, json)?;
    handle.join()?;
    Ok(())
}

fn handle_init_config() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Wrote {}", Config::path()?.display());
    Ok(())
}

/// Drain the worker's event channel, rendering progress for a human or
/// as JSON lines for a machine consumer.
fn report_events(events: &Receiver<WorkerMessage>, json: bool) -> Result<()> {
    let mut failure: Option<String> = None;

    for msg in events {
        if json {
            println!("{}", serde_json::to_string(&msg)?);
            if let WorkerMessage::BatchFailed { error, .. } = msg {
                failure = Some(error);
            }
            continue;
        }

        match msg {
            WorkerMessage::JobStarted { label, .. } => {
                println!("Encoding {label}");
            }
            WorkerMessage::Progress(snapshot) => {
                print!(
                    "\rProgress: {:3}% ({} at {}%)",
                    snapshot.overall_pct, snapshot.current_label, snapshot.item_pct
                );
                if let Some(eta) = snapshot.eta_secs {
                    print!(" | ETA: {}", format_secs(eta));
                }
                std::io::stdout().flush().ok();
            }
            WorkerMessage::JobCompleted { completed, total, .. } => {
                println!("\nCompleted {completed}/{total}");
            }
            WorkerMessage::BatchCompleted(report) => {
                println!(
                    "Done: {} file(s) in {}, {:.1} MB in, {:.1} MB out",
                    report.completed,
                    format_secs(report.elapsed_secs),
                    report.input_bytes as f64 / (1024.0 * 1024.0),
                    report.output_bytes as f64 / (1024.0 * 1024.0),
                );
                if let Some(ratio) = report.compression_ratio() {
                    println!("Compression ratio: {:.0}% of original", ratio * 100.0);
                }
            }
            WorkerMessage::BatchFailed { error, report } => {
                println!(
                    "\nFailed after {} file(s): {error}",
                    report.completed
                );
                failure = Some(error);
            }
        }
    }

    match failure {
        Some(error) => bail!("{error}"),
        None => Ok(()),
    }
}

fn format_secs(secs: f64) -> String {
    let total = secs.round() as u64;
    if total >= 3600 {
        format!("{}h{:02}m{:02}s", total / 3600, (total % 3600) / 60, total % 60)
    } else if total >= 60 {
        format!("{}m{:02}s", total / 60, total % 60)
    } else {
        format!("{total}s")
    }
}
