// Command-line surface: flag definitions and their conversion into the
// explicit run configuration the workflow consumes.

use crate::api::ApiVersion;
use crate::status::POLL_INTERVAL;
use crate::workflow::{RunConfig, Submission};
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dentcad-cli",
    version,
    about = "Submit dental scan orders and download the finished design archive"
)]
pub struct Cli {
    /// Account email.
    #[arg(long)]
    pub email: String,

    /// Account password; prompted for interactively when omitted.
    #[arg(long)]
    pub password: Option<String>,

    /// Upper jaw scan file.
    #[arg(long, value_name = "FILE")]
    pub upper: Option<PathBuf>,

    /// Lower jaw scan file.
    #[arg(long, value_name = "FILE")]
    pub lower: Option<PathBuf>,

    /// Tooth numbers the order concerns, comma separated (e.g. 11,21).
    #[arg(long, value_delimiter = ',', value_name = "UNN")]
    pub unns: Vec<u32>,

    /// Restoration material.
    #[arg(long, default_value = "zirconia")]
    pub material: String,

    /// Tooth numbering system the unns are given in.
    #[arg(long, default_value = "UNS")]
    pub tooth_system: String,

    /// Design preference; may be repeated.
    #[arg(long = "preference", value_name = "PREF")]
    pub preferences: Vec<String>,

    /// Directory the result archive is written into. Defaults to the user
    /// download directory.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Existing order id: skip submission and go straight to polling.
    #[arg(long, value_name = "ID")]
    pub order_id: Option<String>,

    /// Vendor API generation to talk to.
    #[arg(long, value_enum, default_value = "v3")]
    pub api_version: ApiVersion,

    /// Base endpoint URL; the production host when omitted.
    pub endpoint: Option<String>,
}

impl Cli {
    /// Validate the flag combination and assemble the run configuration.
    /// Violations abort here, before any network call.
    pub fn into_run_config(self, password: String) -> Result<RunConfig> {
        let submission = match (self.upper, self.lower) {
            (Some(upper), Some(lower)) => {
                if self.unns.is_empty() {
                    bail!("At least one tooth number is required (--unns)");
                }
                Some(Submission {
                    upper,
                    lower,
                    unns: self.unns,
                    material: self.material,
                    tooth_system: self.tooth_system,
                    preferences: self.preferences,
                })
            }
            (None, None) => None,
            _ => bail!("--upper and --lower must be given together"),
        };

        if submission.is_none() && self.order_id.is_none() {
            bail!("Provide --upper/--lower scan files, or --order-id to reuse an order");
        }

        let output_dir = self.output_dir.unwrap_or_else(default_output_dir);
        Ok(RunConfig {
            email: self.email,
            password,
            submission,
            order_id: self.order_id,
            output_dir,
            endpoint: self.endpoint,
            version: self.api_version,
            poll_interval: POLL_INTERVAL,
        })
    }
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}
