// Workflow module: the one-shot pipeline. Resolve the endpoint, log in,
// submit the order (or reuse an existing one), wait for the design, accept
// it when the version's policy asks for that, and write the result archive
// to disk. Runs strictly top to bottom; any failing step aborts the run.

use crate::api::{resolve_endpoint, ApiClient, ApiVersion, Session};
use crate::archive;
use crate::order::OrderDescriptor;
use crate::review::ReviewAction;
use crate::status::OrderStatus;
use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Scan files and case details needed to place a new order. Absent when an
/// existing order id is being reused.
#[derive(Debug, Clone)]
pub struct Submission {
    pub upper: PathBuf,
    pub lower: PathBuf,
    pub unns: Vec<u32>,
    pub material: String,
    pub tooth_system: String,
    pub preferences: Vec<String>,
}

/// Everything one run needs, assembled from the command line before any
/// network call is made.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub email: String,
    pub password: String,
    pub submission: Option<Submission>,
    pub order_id: Option<String>,
    pub output_dir: PathBuf,
    pub endpoint: Option<String>,
    pub version: ApiVersion,
    pub poll_interval: Duration,
}

/// Run the full pipeline and return the path of the downloaded archive.
pub fn run(config: &RunConfig) -> Result<PathBuf> {
    let base_url = resolve_endpoint(config.endpoint.as_deref());
    let api = ApiClient::new(base_url, config.version)?;

    let spinner = step_spinner("Logging in...");
    let session = api.login(&config.email, &config.password)?;
    spinner.finish_with_message("Logged in");

    let order_id = match (&config.order_id, &config.submission) {
        (Some(id), _) => {
            println!("Reusing existing order {}", id);
            id.clone()
        }
        (None, Some(submission)) => submit_order(&api, &session, submission)?,
        (None, None) => bail!("Either scan files or an existing order id must be provided"),
    };

    let spinner = step_spinner("Waiting for the design...");
    let status = api.wait_for_ready(
        &session,
        &order_id,
        config.poll_interval,
        |polls, status| {
            if status.message.is_empty() {
                spinner.set_message(format!("Waiting for the design... (check {})", polls));
            } else {
                spinner.set_message(format!(
                    "Waiting for the design... {} (check {})",
                    status.message, polls
                ));
            }
        },
    )?;
    spinner.finish_with_message("Design finished");

    finalize(&api, &session, &order_id, &status)?;

    let spinner = step_spinner("Downloading the result...");
    let bytes = api.download_result(&session, &order_id)?;
    spinner.finish_with_message("Result downloaded");

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    let out_path = config.output_dir.join(format!("{}.zip", order_id));
    fs::write(&out_path, &bytes)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    Ok(out_path)
}

/// Place a new order: descriptor first, then the zipped scans. v3 creates
/// the order before any file moves; v2 qualifies the descriptor and hands
/// back an order file that travels inside the archive.
fn submit_order(api: &ApiClient, session: &Session, submission: &Submission) -> Result<String> {
    let upper = read_scan(&submission.upper)?;
    let lower = read_scan(&submission.lower)?;

    let descriptor = OrderDescriptor {
        material: submission.material.clone(),
        tooth_system: submission.tooth_system.clone(),
        scan_files: vec![upper.0.clone(), lower.0.clone()],
        unns: submission.unns.clone(),
        preferences: submission.preferences.clone(),
    };

    let spinner = step_spinner("Submitting the order...");
    let (order_id, entries) = match api.version() {
        ApiVersion::V3 => {
            let order_id = api.create_order(session, &descriptor)?;
            (order_id, vec![upper, lower])
        }
        ApiVersion::V2 => {
            let qualified = api.qualify_order(session, &descriptor)?;
            let entries = vec![upper, lower, (qualified.file_name, qualified.contents)];
            (qualified.order_id, entries)
        }
    };

    let bundle = archive::build_archive(&entries)?;
    api.upload_archive(session, &order_id, bundle)?;
    spinner.finish_with_message(format!("Order {} submitted", order_id));
    Ok(order_id)
}

/// Version-specific acceptance policies. v3 reports an explicit review
/// gate; v2 reports whether the order was already accepted. The two checks
/// are not interchangeable.
fn finalize(api: &ApiClient, session: &Session, order_id: &str, status: &OrderStatus) -> Result<()> {
    match api.version() {
        ApiVersion::V3 if status.reviewable => {
            println!("Accepting the design for order {}", order_id);
            api.review_order(session, order_id, ReviewAction::Accept)
        }
        ApiVersion::V2 if !status.accepted => {
            println!("Accepting order {}", order_id);
            api.review_order(session, order_id, ReviewAction::Accept)
        }
        _ => Ok(()),
    }
}

fn read_scan(path: &Path) -> Result<(String, Vec<u8>)> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Scan path {} has no usable file name", path.display()))?;
    let contents =
        fs::read(path).with_context(|| format!("Failed to read scan file {}", path.display()))?;
    Ok((name, contents))
}

fn step_spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(message);
    spinner
}
