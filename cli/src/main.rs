use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mouth_core::{
    CpalDevice, FallbackPolicy, MouthConfig, PiperEngine, RateNegotiator,
    SampleCodec, Speaker, WaveReader,
};
use mouth_core as core;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mouth", version, about = "Text-to-speech through piper")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log every playback attempt
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize text and play it. Reads stdin when TEXT is omitted.
    Speak {
        text: Option<String>,

        /// Synthesis engine executable
        #[arg(long)]
        binary: Option<PathBuf>,

        /// Voice model (.onnx); its config is expected at MODEL.json
        #[arg(long)]
        model: Option<PathBuf>,

        /// Keep the synthesized wave file at this path
        #[arg(long)]
        keep: Option<PathBuf>,

        /// per-rate or float-first
        #[arg(long)]
        policy: Option<FallbackPolicy>,
    },

    /// Play an existing wave file
    Play {
        input: PathBuf,

        /// per-rate or float-first
        #[arg(long)]
        policy: Option<FallbackPolicy>,
    },

    /// Print container information
    Info { input: PathBuf },

    /// Convert a wave file to mono at another rate
    Render {
        input: PathBuf,

        #[arg(long)]
        rate: u32,

        #[arg(short, long)]
        out: PathBuf,

        #[arg(long, default_value_t = 16)]
        bits: u16,
    },

    /// Show the output device and the rates it will be offered
    Devices,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "mouth=debug,mouth_core=debug"
    } else {
        "mouth=info,mouth_core=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<MouthConfig> {
    match path {
        Some(path) => MouthConfig::from_toml_file(path)
            .with_context(|| format!("Loading {}", path.display())),
        None => Ok(MouthConfig::default()),
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Speak {
            text,
            binary,
            model,
            keep,
            policy,
        } => {
            if let Some(binary) = binary {
                config.piper_binary = binary;
            }

            if model.is_some() {
                config.model = model;
                config.model_config = None;
            }

            if keep.is_some() {
                config.keep_output = keep;
            }

            if let Some(policy) = policy {
                config.fallback_policy = policy;
            }

            let text = match text {
                Some(text) => text,
                None => read_stdin()?,
            };

            speak(&config, &text)
        }
        Command::Play { input, policy } => {
            if let Some(policy) = policy {
                config.fallback_policy = policy;
            }

            let device = CpalDevice::new();
            let negotiator = negotiator(&config, &device);
            let reader = WaveReader::open(&input)
                .with_context(|| format!("Opening {}", input.display()))?;

            let playback = core::play_wave(reader, &negotiator, device)?;
            println!(
                "Played at {} Hz ({}) after {} attempt(s)",
                playback.frame_rate,
                playback.encoding,
                playback.attempts.len()
            );

            Ok(())
        }
        Command::Info { input } => {
            let info = WaveReader::open(&input)
                .with_context(|| format!("Opening {}", input.display()))?
                .metadata();

            println!("Information");
            println!("\tChannels = {}", info.channels);
            println!("\tSample rate = {}", info.frame_rate);
            println!("\tSample bits = {}", info.sample_width * 8);
            println!(
                "\tDuration = {} frames ({:.3}s)",
                info.frame_count,
                info.duration_secs()
            );

            Ok(())
        }
        Command::Render {
            input,
            rate,
            out,
            bits,
        } => {
            let codec = SampleCodec::for_bits(bits)?;
            let reader = WaveReader::open(&input)
                .with_context(|| format!("Opening {}", input.display()))?;
            let buffer = core::load_buffer(reader)?;
            let (rendered, gain) = core::prepare(&buffer, rate)?;

            if gain < 1.0 {
                warn!(gain, "Output scaled down to avoid clipping");
            }

            core::write_wav_file(&rendered, codec, &out)?;
            println!(
                "Rendered {} frames at {} Hz to {}",
                rendered.len(),
                rate,
                out.display()
            );

            Ok(())
        }
        Command::Devices => {
            let device = CpalDevice::new();

            match device.device_name() {
                Some(name) => println!("Output device: {}", name),
                None => println!("No output device found"),
            }

            let negotiator = negotiator(&config, &device);
            let capability = negotiator.capability();
            println!("Candidate rates: {:?}", capability.candidate_rates);
            println!("Fallback encoding: {}", capability.fallback);

            Ok(())
        }
    }
}

fn negotiator(config: &MouthConfig, device: &CpalDevice) -> RateNegotiator {
    let capability = if config.query_device_rates {
        device
            .capability(&config.candidate_rates)
            .unwrap_or_else(|| {
                warn!("Could not query device rates, using configured list");
                config.capability()
            })
    } else {
        config.capability()
    };

    RateNegotiator::new(capability, config.fallback_policy)
}

fn read_stdin() -> Result<String> {
    let mut stdin = io::stdin();

    if stdin.is_terminal() {
        eprintln!("Enter the text to convert to speech.");
        eprintln!("You can enter multiple lines. Press Ctrl+D to finish.");
    }

    let mut text = String::new();
    stdin.read_to_string(&mut text).context("Reading stdin")?;
    Ok(text)
}

fn speak(config: &MouthConfig, text: &str) -> Result<()> {
    let engine = PiperEngine::from_config(config)?;
    let device = CpalDevice::new();
    let negotiator = negotiator(config, &device);

    let mut speaker = Speaker::new(engine, negotiator, device)
        .keep_output(config.keep_output.clone());

    match speaker.speak(text)? {
        Some(playback) => info!(
            rate = playback.frame_rate,
            encoding = %playback.encoding,
            "Done."
        ),
        None => println!("No input provided. Nothing to do."),
    }

    Ok(())
}
