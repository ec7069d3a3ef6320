// Status module: the order lifecycle as reported by the server, and the
// poll loop that waits for it to leave the `processing` state.

use crate::api::{ensure_success, ApiClient, Session};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::thread;
use std::time::Duration;

/// Fixed delay between status checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Server-reported order state. Each API version only fills the fields it
/// knows: `reviewable` is v3's review gate, `accepted` is v2's.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderStatus {
    pub processing: bool,
    pub failed: bool,
    pub reviewable: bool,
    pub accepted: bool,
    pub message: String,
}

impl ApiClient {
    /// Single status fetch.
    pub fn order_status(&self, session: &Session, order_id: &str) -> Result<OrderStatus> {
        let res = self
            .http()
            .get(self.url(&self.version().status_path(order_id)))
            .headers(session.headers())
            .send()
            .context("Failed to send status request")?;
        let res = ensure_success(res, "Status check")?;
        res.json().context("Parsing status response json")
    }

    /// Poll the order until it leaves `processing`. `on_poll` sees every
    /// observed status, in order, for progress reporting.
    pub fn wait_for_ready(
        &self,
        session: &Session,
        order_id: &str,
        interval: Duration,
        on_poll: impl FnMut(u32, &OrderStatus),
    ) -> Result<OrderStatus> {
        poll_until_ready(|| self.order_status(session, order_id), interval, on_poll)
    }
}

/// The poll loop itself, with the fetch behind a closure so the sequencing
/// can be exercised against scripted statuses. Sleeps `interval` between
/// fetches; aborts as soon as the server reports failure; returns the first
/// non-processing status. There is no retry cap; the wait is bounded only
/// by the server reaching a terminal state.
pub fn poll_until_ready<F, P>(mut fetch: F, interval: Duration, mut on_poll: P) -> Result<OrderStatus>
where
    F: FnMut() -> Result<OrderStatus>,
    P: FnMut(u32, &OrderStatus),
{
    let mut polls = 0u32;
    loop {
        let status = fetch()?;
        polls += 1;
        on_poll(polls, &status);

        if status.failed {
            if status.message.is_empty() {
                bail!("Order processing failed");
            }
            bail!("Order processing failed: {}", status.message);
        }
        if !status.processing {
            return Ok(status);
        }
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn processing() -> OrderStatus {
        OrderStatus {
            processing: true,
            ..OrderStatus::default()
        }
    }

    fn ready() -> OrderStatus {
        OrderStatus {
            reviewable: true,
            message: "design ready".into(),
            ..OrderStatus::default()
        }
    }

    fn failed(message: &str) -> OrderStatus {
        OrderStatus {
            failed: true,
            message: message.into(),
            ..OrderStatus::default()
        }
    }

    #[test]
    fn polls_until_the_first_non_processing_status() {
        let calls = Cell::new(0u32);
        let mut scripted = vec![processing(), processing(), ready()].into_iter();

        let status = poll_until_ready(
            || {
                calls.set(calls.get() + 1);
                Ok(scripted.next().expect("loop fetched past the script"))
            },
            Duration::ZERO,
            |_, _| {},
        )
        .unwrap();

        assert_eq!(calls.get(), 3);
        assert!(!status.processing);
        assert!(status.reviewable);
        assert_eq!(status.message, "design ready");
    }

    #[test]
    fn failure_aborts_without_further_fetches() {
        let calls = Cell::new(0u32);
        // a ready status is queued after the failure; it must never be read
        let mut scripted = vec![failed("margin line unreadable"), ready()].into_iter();

        let err = poll_until_ready(
            || {
                calls.set(calls.get() + 1);
                Ok(scripted.next().unwrap())
            },
            Duration::ZERO,
            |_, _| {},
        )
        .unwrap_err();

        assert_eq!(calls.get(), 1);
        assert!(err.to_string().contains("margin line unreadable"));
    }

    #[test]
    fn on_poll_sees_every_observation() {
        let mut seen = Vec::new();
        let mut scripted = vec![processing(), ready()].into_iter();

        poll_until_ready(
            || Ok(scripted.next().unwrap()),
            Duration::ZERO,
            |polls, status| seen.push((polls, status.processing)),
        )
        .unwrap();

        assert_eq!(seen, vec![(1, true), (2, false)]);
    }

    #[test]
    fn status_fields_all_default_when_omitted() {
        let status: OrderStatus = serde_json::from_str(r#"{"processing":true}"#).unwrap();
        assert!(status.processing);
        assert!(!status.failed);
        assert!(!status.reviewable);
        assert!(!status.accepted);
        assert!(status.message.is_empty());
    }
}
