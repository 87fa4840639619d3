use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod async_utils;
mod batch;
mod cmd;
mod config;
mod converter;
mod engines;
mod prelude;
mod selection;
#[cfg(test)]
mod test_log;
mod ui;

/// OCR and compress PDF files in place.
#[derive(Debug, Parser)]
#[clap(
    version,
    after_help = r#"
External Tools:
  - ocrmypdf: adds a text layer to each PDF.
  - gs (Ghostscript): recompresses the result.

  Run `pdf-manager check` to make sure both are installed.

Environment Variables:
  - PDF_MANAGER_OCRMYPDF (optional): The `ocrmypdf` program to run.
  - PDF_MANAGER_GS (optional): The Ghostscript program to run.
  - RUST_LOG (optional): Log filter, such as `debug` or `pdf_manager=trace`.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// OCR and compress PDF files, replacing each one in place.
    Convert(cmd::convert::ConvertOpts),
    /// Check that `ocrmypdf` and Ghostscript are installed.
    Check(cmd::check::CheckOpts),
    /// Print schemas for the config file and report formats.
    Schema(cmd::schema::SchemaOpts),
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a `.env` file, if it exists. We do this
    // first so that `RUST_LOG` can be set there, too.
    dotenvy::dotenv().ok();

    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    // We can stack multiple layers here if we need to.
    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up. External tools
    // run in their own process groups and don't see the terminal's Ctrl-C, so
    // we catch it and drop `real_main`, which kills them.
    tokio::select! {
        result = real_main(ui) => result,
        Ok(()) = tokio::signal::ctrl_c() => Err(anyhow!("interrupted")),
    }
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Run the appropriate subcommand.
    match &opts.subcmd {
        Cmd::Convert(opts) => {
            cmd::convert::cmd_convert(ui, opts).await?;
        }
        Cmd::Check(opts) => {
            cmd::check::cmd_check(ui, opts).await?;
        }
        Cmd::Schema(schema_opts) => {
            cmd::schema::cmd_schema(schema_opts).await?;
        }
    }
    Ok(())
}
