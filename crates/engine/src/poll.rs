//! Waiting for long-running operations.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tether_api::{ApiResponse, RequestOptions, RestClient};
use tether_types::{HttpMethod, PollOptions};
use tether_util::{http::to_request_path, locate};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{EngineError, clock::Clock};

/// Poll until `options.success` is observed.
///
/// The first status comes from `initial`, so a response that is already
/// terminal issues no request. Returns the last response seen.
pub async fn poll_until_done(
    client: &RestClient,
    clock: &dyn Clock,
    cancel: &CancellationToken,
    initial: ApiResponse,
    options: &PollOptions,
) -> Result<ApiResponse, EngineError> {
    let url = poll_url(client, &initial, options)?;
    let request = RequestOptions::default().with_header(options.header.clone());
    let default_delay = Duration::from_secs(options.default_delay_sec);
    let start = Instant::now();

    let mut response = initial;
    let mut status = status_of(&response, options)?;
    let mut attempts = 0usize;
    loop {
        if options.is_success(&status) {
            info!(
                url = %url,
                status = %status,
                attempts,
                duration_ms = start.elapsed().as_millis(),
                "polled to success"
            );
            return Ok(response);
        }
        if !options.is_pending(&status) {
            warn!(url = %url, status = %status, attempts, "polling stopped on unexpected status");
            return Err(EngineError::PollFailure { status });
        }

        let delay = response
            .retry_after(clock.now())
            .map_or(default_delay, |requested| requested.max(default_delay));
        debug!(url = %url, status = %status, delay_ms = delay.as_millis(), "operation pending");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        attempts += 1;
        response = client.execute(cancel, HttpMethod::Get, &url, None, &request).await?;
        status = if response.status() == StatusCode::NOT_FOUND && options.success == "404" {
            "404".to_string()
        } else {
            status_of(&response, options)?
        };
    }
}

fn poll_url(client: &RestClient, initial: &ApiResponse, options: &PollOptions) -> Result<String, EngineError> {
    let Some(locator) = &options.url_locator else {
        return Ok(to_request_path(initial.request_url(), client.base_url()));
    };
    match locate(locator, initial)? {
        Some(location) if !location.is_empty() => Ok(to_request_path(&location, client.base_url())),
        _ => Err(EngineError::PollUrlMissing {
            locator: locator.to_string(),
        }),
    }
}

/// The located status; absent values read as the empty string.
fn status_of(response: &ApiResponse, options: &PollOptions) -> Result<String, EngineError> {
    Ok(locate(&options.status_locator, response)?.unwrap_or_default())
}
