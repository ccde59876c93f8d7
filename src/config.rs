use std::path::Path;

use anyhow::anyhow;
use config::{Config, File};
use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::ClientCapabilities;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Quiet period after the last edit before files are re-validated
    pub debounce_ms: u64,
    pub diagnostics: bool,
    pub goto_definition: bool,
    /// Report files that include each other
    pub cycle_diagnostics: bool,
}

impl Settings {
    pub fn new(root_dir: &Path, capabilities: &ClientCapabilities) -> anyhow::Result<Settings> {
        let expanded = shellexpand::tilde("~/.config/hassle/settings");
        let settings = Config::builder()
            .add_source(File::with_name(&expanded).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.hassle",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            )
            .set_default("debounce_ms", 600)?
            .set_default("diagnostics", true)?
            .set_default("goto_definition", true)?
            .set_default("cycle_diagnostics", true)?
            .set_override_option(
                "diagnostics",
                capabilities.text_document.as_ref().and_then(|it| {
                    match it.publish_diagnostics.is_none() {
                        true => Some(false),
                        false => None,
                    }
                }),
            )?
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let settings = settings.try_deserialize::<Settings>()?;

        anyhow::Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            debounce_ms: 600,
            diagnostics: true,
            goto_definition: true,
            cycle_diagnostics: true,
        }
    }
}
