use std::io::Write;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_id_mapper::config::ConfigLoader;
use kira_id_mapper::domain::Namespace;
use kira_id_mapper::engine::HttpResolver;
use kira_id_mapper::error::MapperError;
use kira_id_mapper::input::collect_identifiers;
use kira_id_mapper::output::JsonOutput;
use kira_id_mapper::policy::RetentionPolicy;
use kira_id_mapper::timer::{Timer, TimerReport};

#[derive(Parser)]
#[command(name = "kira-idmap")]
#[command(about = "Refresh and convert gene and protein identifiers across naming authorities")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true, help = "Print phase timings to stderr")]
    timings: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Map identifiers to their current form in the same namespace")]
    Refresh(RefreshArgs),
    #[command(about = "Map identifiers from one namespace to another")]
    Convert(ConvertArgs),
}

#[derive(Args)]
struct InputArgs {
    ids: Vec<String>,

    #[arg(long, help = "File with one identifier per line")]
    input: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct RefreshArgs {
    #[arg(long)]
    namespace: Namespace,

    #[arg(long, default_value_t = RetentionPolicy::Present)]
    keep: RetentionPolicy,

    #[command(flatten)]
    input: InputArgs,
}

#[derive(Args)]
struct ConvertArgs {
    #[arg(long)]
    from: Namespace,

    #[arg(long)]
    to: Namespace,

    #[command(flatten)]
    input: InputArgs,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<MapperError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MapperError) -> u8 {
    match error {
        MapperError::InvalidNamespace(_)
        | MapperError::InvalidRetention(_)
        | MapperError::ConfigRead(_)
        | MapperError::ConfigParse(_)
        | MapperError::InputRead { .. } => 2,
        other if other.is_backend() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(source) = &config.source {
        tracing::debug!(%source, "loaded config");
    }
    let resolver = HttpResolver::from_config(&config)?;
    let mut timer = Timer::new();

    let result = match cli.command {
        Commands::Refresh(args) => {
            collect_identifiers(&args.input.ids, args.input.input.as_deref())
                .and_then(|ids| resolver.refresh(&ids, args.namespace, args.keep, &mut timer))
                .map_err(miette::Report::from)
                .and_then(|outcome| JsonOutput::print_refresh(&outcome).into_diagnostic())
        }
        Commands::Convert(args) => {
            collect_identifiers(&args.input.ids, args.input.input.as_deref())
                .and_then(|ids| resolver.convert(&ids, args.from, args.to, &mut timer))
                .map_err(miette::Report::from)
                .and_then(|resolution| JsonOutput::print_convert(&resolution).into_diagnostic())
        }
    };

    let timings = cli.timings.then(|| timer.report());
    finish(result, timings.as_ref(), &mut std::io::stderr())
}

/// Writes the timing report even when the command failed, so a partial run still shows where
/// it stopped. The command's own error wins over a failed report write.
fn finish<W: Write>(
    result: miette::Result<()>,
    timings: Option<&TimerReport>,
    out: &mut W,
) -> miette::Result<()> {
    let Some(report) = timings else {
        return result;
    };
    let written = JsonOutput::write_timings(out, report).into_diagnostic();
    result.and(written)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use kira_id_mapper::timer::TaskTimer;

    use super::*;

    fn interrupted_run() -> Timer {
        let mut timer = Timer::new();
        timer.start("convert Uniprot -> Entrez");
        timer.start("uniprot: accession");
        timer
    }

    #[test]
    fn timings_are_written_when_the_command_fails() {
        let report = interrupted_run().report();
        let mut out = Vec::new();

        let result = finish(
            Err(MapperError::RetriesExhausted {
                operation: "aggregator query".to_string(),
                attempts: 10,
                message: "reset".to_string(),
            }
            .into()),
            Some(&report),
            &mut out,
        );

        let error = result.unwrap_err();
        assert_matches!(
            error.downcast_ref::<MapperError>(),
            Some(MapperError::RetriesExhausted { .. })
        );
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("uniprot: accession (never closed)"));
    }

    #[test]
    fn nothing_is_written_without_the_flag() {
        let mut out = Vec::new();
        let result = finish(Ok(()), None, &mut out);
        assert!(result.is_ok());
        assert!(out.is_empty());
    }
}
