//! xlreport CLI - render an XLSX report template from JSON data

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use xlreport::{MissingKey, RenderOptions, StaticContext, Template};

/// Wrong or missing arguments
const EXIT_USAGE: u8 = 1;
/// The template could not be opened
const EXIT_TEMPLATE: u8 = 2;
/// Reading data, rendering or saving failed
const EXIT_RENDER: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "xlreport")]
#[command(author, version, about = "Render an XLSX report template from JSON data")]
struct Cli {
    /// Template workbook (xlsx)
    template: PathBuf,

    /// Data file (JSON)
    data: PathBuf,

    /// Report to write (xlsx)
    output: PathBuf,

    /// JSON object of extra report constants
    #[arg(long = "static", value_name = "FILE")]
    static_file: Option<PathBuf>,

    /// Company name constant (`{{.CompanyName}}`)
    #[arg(long, env = "XLREPORT_COMPANY_NAME")]
    company_name: Option<String>,

    /// License constant (`{{.License}}`)
    #[arg(long, env = "XLREPORT_LICENSE")]
    license: Option<String>,

    /// What a lookup of a missing key does
    #[arg(long, value_enum, default_value_t = MissingKeyArg::Error)]
    missing_key: MissingKeyArg,

    /// Do not build `<<`/`>>` merged regions
    #[arg(long)]
    no_merge: bool,

    /// Log scanned tags and row edits
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MissingKeyArg {
    /// Fail the render
    Error,
    /// Render nothing
    Zero,
}

impl From<MissingKeyArg> for MissingKey {
    fn from(arg: MissingKeyArg) -> Self {
        match arg {
            MissingKeyArg::Error => MissingKey::Error,
            MissingKeyArg::Zero => MissingKey::Zero,
        }
    }
}

impl Cli {
    fn render_options(&self) -> RenderOptions {
        RenderOptions::new()
            .with_trace(self.trace)
            .with_missing_key(self.missing_key.into())
            .with_merge(!self.no_merge)
    }

    fn statics(&self) -> Result<StaticContext> {
        let mut statics = StaticContext::with_current_time();
        if let Some(path) = &self.static_file {
            let value = read_json(path)?;
            if !statics.extend_from(value) {
                bail!("'{}' does not hold a JSON object", path.display());
            }
        }
        if let Some(name) = &self.company_name {
            statics = statics.company_name(name.as_str());
        }
        if let Some(license) = &self.license {
            statics = statics.license(license.as_str());
        }
        Ok(statics)
    }
}

/// An error and the exit code it maps to
struct Failure {
    code: u8,
    error: anyhow::Error,
}

trait ExitStage<T> {
    fn exit_with(self, code: u8) -> std::result::Result<T, Failure>;
}

impl<T> ExitStage<T> for Result<T> {
    fn exit_with(self, code: u8) -> std::result::Result<T, Failure> {
        self.map_err(|error| Failure { code, error })
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let level = if cli.trace { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure { code, error }) => {
            eprintln!("Error: {:?}", error);
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli) -> std::result::Result<(), Failure> {
    let template = Template::open(&cli.template, StaticContext::new())
        .with_context(|| format!("Failed to open template '{}'", cli.template.display()))
        .exit_with(EXIT_TEMPLATE)?;
    let template = template.with_statics(cli.statics().exit_with(EXIT_RENDER)?);

    let data = read_json(&cli.data).exit_with(EXIT_RENDER)?;

    let rendered = template
        .render(&data, &cli.render_options())
        .with_context(|| format!("Failed to render '{}'", cli.template.display()))
        .exit_with(EXIT_RENDER)?;

    rendered
        .save(&cli.output)
        .with_context(|| format!("Failed to write '{}'", cli.output.display()))
        .exit_with(EXIT_RENDER)?;

    let report = &rendered.report;
    log::info!(
        "wrote '{}': {} static tags, {} blocks, {} merges",
        cli.output.display(),
        report.statics,
        report.blocks.len(),
        report.merges.len()
    );
    for location in &report.skipped_dates {
        log::warn!("date cell {} kept its template value", location);
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("'{}' is not valid JSON", path.display()))
}
