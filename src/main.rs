use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bpg_bridge::codec::{BackendKind, CodecBackend, CodecBridge, NativeBackend, PassthroughBackend};
use bpg_bridge::config::{BridgeConfig, ConfigStore, OutputConfig};
use bpg_bridge::pipeline::{RoundTrip, RoundTripReport};
use bpg_bridge::video::{ChromaMode, Resolution};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Codec backend selection
#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Native,
    Passthrough,
}

/// Chroma plane content
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChromaArg {
    /// Green and blue samples (bit-compatible with existing streams)
    Sampled,
    /// BT.601 colour differences
    Bt601,
}

impl From<ChromaArg> for ChromaMode {
    fn from(arg: ChromaArg) -> Self {
        match arg {
            ChromaArg::Sampled => ChromaMode::Sampled,
            ChromaArg::Bt601 => ChromaMode::Bt601,
        }
    }
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Native => BackendKind::Native,
            BackendArg::Passthrough => BackendKind::Passthrough,
        }
    }
}

/// bpg-bridge command line arguments
#[derive(Parser, Debug)]
#[command(name = "bpg-bridge")]
#[command(version, about = "Round-trip images through a native BPG encoder/decoder", long_about = None)]
struct CliArgs {
    /// Configuration file (JSON)
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Codec backend (overrides config)
    #[arg(short = 'b', long, value_enum, global = true)]
    backend: Option<BackendArg>,

    /// Path to the encoder shared object (overrides config)
    #[arg(long, value_name = "FILE", global = true)]
    encoder_lib: Option<PathBuf>,

    /// Path to the decoder shared object (overrides config)
    #[arg(long, value_name = "FILE", global = true)]
    decoder_lib: Option<PathBuf>,

    /// Chroma plane content (overrides config)
    #[arg(long, value_enum, global = true)]
    chroma: Option<ChromaArg>,

    /// Write and read streams without the BPG magic header
    #[arg(long, global = true)]
    raw_stream: bool,

    /// Print the run report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Codec(CodecCommand),
    /// Print the effective configuration
    Config {
        /// Save it to the --config file
        #[arg(long)]
        write: bool,
    },
}

/// Subcommands that drive a codec backend
#[derive(Subcommand, Debug)]
enum CodecCommand {
    /// Convert, encode, decode and save an image
    Roundtrip {
        /// Input image (any format the image decoder understands)
        input: PathBuf,
        /// Output image (PNG keeps the decoded pixels lossless)
        output: PathBuf,
        /// Also keep the encoded stream in this file
        #[arg(long, value_name = "FILE")]
        stream: Option<PathBuf>,
    },
    /// Encode an image into a .bpg stream file
    Encode { input: PathBuf, stream: PathBuf },
    /// Decode a .bpg stream file into an image
    Decode {
        stream: PathBuf,
        output: PathBuf,
        /// Frame width in pixels
        #[arg(long)]
        width: u32,
        /// Frame height in pixels
        #[arg(long)]
        height: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose, args.log_json);
    tracing::debug!("Starting bpg-bridge v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().or_else(config_path_from_env);
    let mut config = match &config_path {
        Some(path) => ConfigStore::open(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?
            .get()
            .clone(),
        None => BridgeConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let command = match &args.command {
        Command::Codec(command) => command,
        Command::Config { write } => {
            if *write {
                let path = config_path
                    .as_ref()
                    .context("--write needs --config or BPG_BRIDGE_CONFIG")?;
                let mut store = ConfigStore::open(path)?;
                store.set(config.clone())?;
                tracing::info!("Configuration written to {}", store.path().display());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
    };

    let chroma = config.codec.chroma;
    match config.codec.backend {
        BackendKind::Native => {
            let backend = NativeBackend::load(&config.codec.libraries)
                .context("loading native BPG libraries")?;
            run(CodecBridge::new(backend), command, &args, config.output, chroma)
        }
        BackendKind::Passthrough => run(
            CodecBridge::new(PassthroughBackend::with_chroma(chroma)),
            command,
            &args,
            config.output,
            chroma,
        ),
    }
}

fn run<B: CodecBackend>(
    bridge: CodecBridge<B>,
    command: &CodecCommand,
    args: &CliArgs,
    output: OutputConfig,
    chroma: ChromaMode,
) -> anyhow::Result<()> {
    tracing::info!(
        "Using {} codec backend ({} chroma)",
        bridge.backend().name(),
        chroma
    );
    let pipeline = RoundTrip::new(&bridge, output).with_chroma(chroma);

    let report = match command {
        CodecCommand::Roundtrip {
            input,
            output,
            stream,
        } => pipeline
            .run(input, output, stream.as_deref())
            .with_context(|| format!("round trip of {}", input.display()))?,
        CodecCommand::Encode { input, stream } => pipeline
            .encode_file(input, stream)
            .with_context(|| format!("encoding {}", input.display()))?,
        CodecCommand::Decode {
            stream,
            output,
            width,
            height,
        } => pipeline
            .decode_file(stream, Resolution::new(*width, *height), output)
            .with_context(|| format!("decoding {}", stream.display()))?,
    };

    let stats = bridge.stats();
    tracing::debug!("Bridge stats: {:?}", stats);
    if args.json {
        let out = serde_json::json!({ "report": report, "stats": stats });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RoundTripReport) {
    println!("resolution:  {}", report.resolution);
    println!("planar:      {} bytes", report.planar_bytes);
    println!("encoded:     {} bytes", report.encoded_bytes);
    if report.decoded_bytes > 0 {
        println!("decoded:     {} bytes", report.decoded_bytes);
    }
    println!("ratio:       {:.2}", report.compression_ratio);
    if let Some(stream) = &report.stream {
        println!("stream:      {}", stream.display());
    }
    if let Some(output) = &report.output {
        println!("output:      {}", output.display());
    }
    println!("elapsed:     {} ms", report.elapsed_ms);
}

fn apply_overrides(config: &mut BridgeConfig, args: &CliArgs) {
    if let Some(backend) = args.backend {
        config.codec.backend = backend.into();
    }
    if let Some(path) = &args.encoder_lib {
        config.codec.libraries.encoder = path.clone();
    }
    if let Some(path) = &args.decoder_lib {
        config.codec.libraries.decoder = path.clone();
    }
    if let Some(chroma) = args.chroma {
        config.codec.chroma = chroma.into();
    }
    if args.raw_stream {
        config.output.write_container = false;
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var_os("BPG_BRIDGE_CONFIG").map(PathBuf::from)
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8, json: bool) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "bpg_bridge=error,bpgcodec=error",
        LogLevel::Warn => "bpg_bridge=warn,bpgcodec=warn",
        LogLevel::Info => "bpg_bridge=info,bpgcodec=warn",
        LogLevel::Verbose => "bpg_bridge=debug,bpgcodec=info",
        LogLevel::Debug => "bpg_bridge=debug,bpgcodec=debug",
        LogLevel::Trace => "bpg_bridge=trace,bpgcodec=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
