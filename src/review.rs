// Review module: the accept/reject call a finished design may require, and
// the download of the result archive.

use crate::api::{ensure_success, ApiClient, ApiVersion, Session};
use anyhow::{Context, Result};
use serde_json::json;

/// Verdict sent for an order awaiting review.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewAction {
    Accept,
    Reject,
}

impl ReviewAction {
    fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Accept => "accept",
            ReviewAction::Reject => "reject",
        }
    }
}

impl ApiClient {
    /// POST the review verdict. The payload shape differs by version: v3
    /// names the action, v2 sends an accept flag.
    pub fn review_order(
        &self,
        session: &Session,
        order_id: &str,
        action: ReviewAction,
    ) -> Result<()> {
        let payload = match self.version() {
            ApiVersion::V3 => json!({ "action": action.as_str() }),
            ApiVersion::V2 => json!({ "accept": action == ReviewAction::Accept }),
        };
        let res = self
            .http()
            .post(self.url(&self.version().review_path(order_id)))
            .headers(session.headers())
            .json(&payload)
            .send()
            .context("Failed to send review request")?;
        ensure_success(res, "Review")?;
        Ok(())
    }

    /// GET the finished design archive, verbatim server bytes.
    pub fn download_result(&self, session: &Session, order_id: &str) -> Result<Vec<u8>> {
        let res = self
            .http()
            .get(self.url(&self.version().download_path(order_id)))
            .headers(session.upload_headers())
            .send()
            .context("Failed to send download request")?;
        let res = ensure_success(res, "Download")?;
        let bytes = res.bytes().context("Reading the result archive body")?;
        Ok(bytes.to_vec())
    }
}
