//! The `check` subcommand.

use clap::Args;

use crate::{
    config::ConfigOpts,
    engines::{ghostscript::GhostscriptCompressor, ocrmypdf::OcrMyPdfEngine},
    prelude::*,
    ui::Ui,
};

/// Check command line arguments.
#[derive(Debug, Args)]
pub struct CheckOpts {
    #[clap(flatten)]
    pub config_opts: ConfigOpts,
}

/// The `check` subcommand. Makes sure our external tools can be run.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_check(ui: Ui, opts: &CheckOpts) -> Result<()> {
    let config = opts.config_opts.load().await?;
    let tools = [
        OcrMyPdfEngine::new(&config.ocr).tool().to_owned(),
        GhostscriptCompressor::new(&config.compress).tool().to_owned(),
    ];

    let mut missing = vec![];
    for tool in &tools {
        match tool.version().await {
            Ok(version) => {
                ui.display_message("✅", &format!("{} {}", tool.name(), version));
            }
            Err(err) => {
                debug!("{} is not usable: {:?}", tool.name(), err);
                ui.display_message("❌", &format!("{}: {:#}", tool.name(), err));
                missing.push(tool.name());
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("cannot run required tools: {}", missing.join(", ")))
    }
}
