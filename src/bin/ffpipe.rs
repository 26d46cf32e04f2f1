use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use ffpipe::{
    ChainSpec, Filter, FilterValue, Filtergraph, PipedSession, ProcessOpts, ProgressCallback,
    ProgressSnapshot, ReadCount, SessionOpts,
};

#[derive(Parser, Debug)]
#[command(name = "ffpipe", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose a single filter expression.
    Filter(FilterArgs),
    /// Parse a filtergraph and print its chains and pad labels as JSON.
    Parse(ParseArgs),
    /// Follow a label downstream to the graph output(s) it feeds.
    Trace(TraceArgs),
    /// Splice a chain into a filtergraph at a label and print the result.
    Extend(ExtendArgs),
    /// Run ffmpeg with piped stdout/stderr and report progress and output format.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Filter name.
    name: String,

    /// Instance id (`name@id`).
    #[arg(long)]
    id: Option<String>,

    /// Arguments; `key=value` becomes a keyed option, anything else is positional.
    args: Vec<String>,
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Filtergraph description.
    expr: String,
}

#[derive(Args, Debug)]
struct TraceArgs {
    /// Filtergraph description.
    expr: String,

    /// Label to start from.
    label: String,

    /// Fail on fan-out instead of following every branch.
    #[arg(long)]
    no_split: bool,
}

#[derive(Args, Debug)]
struct ExtendArgs {
    /// Filtergraph description.
    expr: String,

    /// Link label to splice at.
    label: String,

    /// Filters of the new chain, comma separated.
    chain: String,

    /// Move the label onto the new chain's output instead of keeping it on the producer.
    #[arg(long)]
    move_label: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// ffmpeg executable.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Report `-progress` blocks.
    #[arg(long)]
    progress: bool,

    /// Echo ffmpeg's log lines.
    #[arg(long)]
    echo: bool,

    /// Collect raw output from stdout (`-f rawvideo pipe:1` style outputs).
    #[arg(long)]
    read: bool,

    /// Seconds to wait for the output stream header.
    #[arg(long, default_value_t = 10.0)]
    header_timeout: f64,

    /// Arguments passed to ffmpeg.
    #[arg(last = true, required = true)]
    args: Vec<OsString>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Command::Filter(args) => cmd_filter(args),
        Command::Parse(args) => cmd_parse(args),
        Command::Trace(args) => cmd_trace(args),
        Command::Extend(args) => cmd_extend(args),
        Command::Run(args) => cmd_run(args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_filter(args: FilterArgs) -> anyhow::Result<()> {
    let mut filter = Filter::new(args.name);
    if let Some(id) = args.id {
        filter = filter.id(id);
    }
    for arg in args.args {
        filter = match arg.split_once('=') {
            Some((key, value)) if is_option_key(key) => filter.opt(key, FilterValue::from(value)),
            _ => filter.arg(arg),
        };
    }
    println!("{}", filter.compose());
    Ok(())
}

fn is_option_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn cmd_parse(args: ParseArgs) -> anyhow::Result<()> {
    let graph = Filtergraph::parse(&args.expr).context("parse filtergraph")?;
    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}

fn cmd_trace(args: TraceArgs) -> anyhow::Result<()> {
    let graph = Filtergraph::parse(&args.expr).context("parse filtergraph")?;
    for label in graph.trace_downstream(&args.label, !args.no_split)? {
        println!("{label}");
    }
    Ok(())
}

fn cmd_extend(args: ExtendArgs) -> anyhow::Result<()> {
    let mut graph = Filtergraph::parse(&args.expr).context("parse filtergraph")?;
    let chain = ChainSpec::new(ffpipe::filtergraph::chain::split_chain(&args.chain));
    let label = graph.extend_chain(chain, &args.label, !args.move_label)?;
    tracing::debug!(%label, "new link label");
    println!("{}", graph.compose()?);
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let mut opts = SessionOpts {
        process: ProcessOpts::new(&args.ffmpeg),
        pipe_stdout: args.read,
        ..SessionOpts::default()
    };
    opts.log.echo = args.echo;

    let progress: Option<ProgressCallback> = args.progress.then(|| {
        Box::new(|s: &ProgressSnapshot| {
            let frame = s.frame().map_or_else(|| "-".to_string(), |f| f.to_string());
            eprintln!("progress: frame={frame} done={}", s.done);
            Ok(false)
        }) as ProgressCallback
    });

    let mut session = PipedSession::spawn(&args.args, opts, progress)
        .with_context(|| format!("start '{}'", args.ffmpeg.display()))?;

    if args.read {
        let timeout = Duration::from_secs_f64(args.header_timeout.max(0.0));
        let descriptor = session
            .start_reader_auto(Some(timeout))
            .context("detect output stream format")?;
        println!("{}", serde_json::to_string_pretty(&descriptor)?);

        let mut elements = 0usize;
        let mut bytes = 0usize;
        loop {
            let block = session.reader().read(ReadCount::Drain, None)?;
            if block.is_empty() {
                break;
            }
            elements += block.count();
            bytes += block.data().len();
        }
        println!("read {elements} element(s), {bytes} byte(s)");
    }

    let status = session.finish()?;
    tracing::info!(%status, "ffmpeg finished");
    Ok(())
}
