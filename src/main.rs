mod api;
mod config;
mod error;
mod sheet;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ModelConfig;
use crate::error::Error;
use crate::sheet::{FlagState, PromptSheet};

const CONFIG_FILE: &str = ".config";
const EXCEL_FILE: &str = "prompts.xlsx";
const SYSTEM_PROMPT_FILE: &str = "systemprompt.txt";

// One sequential pass over the sheet; the runtime only exists for reqwest.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let configs = config::load_model_configs(&env_path("CONFIG_FILE", CONFIG_FILE))?;
    let enabled: Vec<&ModelConfig> = configs.iter().filter(|cfg| cfg.enabled).collect();
    if enabled.is_empty() {
        bail!("no enabled model configurations found");
    }

    let system_prompt = config::load_system_prompt(&env_path("SYSTEM_PROMPT_FILE", SYSTEM_PROMPT_FILE));
    if system_prompt.is_empty() {
        info!("no system prompt configured");
    } else {
        info!(chars = system_prompt.chars().count(), "loaded system prompt");
    }

    let model_names: Vec<String> = enabled.iter().map(|cfg| cfg.name.clone()).collect();
    let mut sheet = PromptSheet::open_or_create(&env_path("EXCEL_FILE", EXCEL_FILE), &model_names)
        .context("failed to open or create the prompts workbook")?;

    let defaulted = sheet.default_missing_flags();
    if defaulted > 0 {
        info!(rows = defaulted, "defaulted empty generate flags to 0");
        sheet.save()?;
    }

    let finished = process_rows(&mut sheet, &enabled, &system_prompt, &ApiGenerator).await;

    sheet.apply_formatting();
    sheet.save()?;
    info!(rows = finished, "run complete");
    Ok(())
}

/// Seam between the row loop and the HTTP client so the loop can be
/// exercised without a network.
trait Generator {
    async fn generate(
        &self,
        cfg: &ModelConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, Error>;
}

struct ApiGenerator;

impl Generator for ApiGenerator {
    async fn generate(
        &self,
        cfg: &ModelConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, Error> {
        api::generate(cfg, system_prompt, user_prompt).await
    }
}

/// Walks every data row once, top to bottom. Each successful generation is
/// written and saved immediately so an interrupted run keeps everything
/// produced so far. Returns the number of rows finished for all models.
async fn process_rows<G: Generator>(
    sheet: &mut PromptSheet,
    models: &[&ModelConfig],
    system_prompt: &str,
    generator: &G,
) -> usize {
    let mut finished = 0;
    for row in sheet.read_rows() {
        match &row.flag {
            FlagState::Done => continue,
            FlagState::Invalid(value) => {
                warn!(row = row.row, value = %value, "skipping row: generate flag must be 0 or 1");
                continue;
            }
            FlagState::Unset => {
                warn!(row = row.row, "unreadable generate flag, resetting to 0");
                sheet.set_flag(row.row, 0);
            }
            FlagState::Generate => {}
        }

        let prompt = row.prompt.trim().to_string();
        if prompt.is_empty() {
            info!(row = row.row, "empty prompt, marking row as done");
            sheet.set_flag(row.row, 1);
            save_or_warn(sheet, row.row);
            continue;
        }

        info!(row = row.row, prompt = %preview(&prompt, 50), "processing row");
        let mut all_succeeded = true;
        for model in models {
            let Some(column) = sheet.result_column(&model.name) else {
                warn!(model = %model.name, "no result column assigned, skipping call");
                all_succeeded = false;
                continue;
            };
            match generator.generate(model, system_prompt, &prompt).await {
                Ok(text) => {
                    sheet.write_result(row.row, column, &text);
                    save_or_warn(sheet, row.row);
                    info!(
                        row = row.row,
                        model = %model.name,
                        chars = text.chars().count(),
                        "result written"
                    );
                }
                Err(err) => {
                    warn!(row = row.row, model = %model.name, error = %err, "generation failed");
                    all_succeeded = false;
                }
            }
        }

        // The flag only flips to 1 when every model answered, so failed rows
        // are picked up again on the next run.
        if all_succeeded {
            sheet.set_flag(row.row, 1);
            save_or_warn(sheet, row.row);
            finished += 1;
        }
    }
    finished
}

fn save_or_warn(sheet: &PromptSheet, row: u32) {
    if let Err(err) = sheet.save() {
        warn!(row, error = %err, "save failed, continuing");
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    env::var(var).unwrap_or_else(|_| default.to_string()).into()
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
