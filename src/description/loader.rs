/*!
HTTP fetch of device and SCPD description documents.

This is a thin wrapper around `reqwest`: the at-most-one-fetch-per-location invariant and the
policy of swallowing fetch errors belong to the [registry](crate::registry), not here.
*/

use crate::description::device::{self, DeviceDescription};
use crate::description::scpd::{self, ScpdDescription};
use crate::Result;
use std::time::Duration;

/// Construction-site options for description fetches.
#[derive(Clone, Debug)]
pub struct DescriptionFetchOptions {
    pub timeout: Duration,
}

impl Default for DescriptionFetchOptions {
    fn default() -> Self {
        DescriptionFetchOptions {
            timeout: Duration::from_secs(10),
        }
    }
}

/// Fetch and parse a device description document at `location`.
pub async fn fetch_description(
    location: &str,
    options: &DescriptionFetchOptions,
) -> Result<DeviceDescription> {
    let body = get(location, options).await?;
    Ok(device::parse(&body)?)
}

/// Fetch and parse an SCPD document at `url`.
pub async fn fetch_scpd(url: &str, options: &DescriptionFetchOptions) -> Result<ScpdDescription> {
    let body = get(url, options).await?;
    Ok(scpd::parse(&body)?)
}

async fn get(url: &str, options: &DescriptionFetchOptions) -> Result<String> {
    debug!("loader::get - fetching {}", url);
    let client = reqwest::Client::builder().timeout(options.timeout).build()?;
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        warn!("loader::get - {} returned status {}", url, response.status());
        return Err(crate::error::unsupported_operation(format!(
            "GET {} ({})",
            url,
            response.status()
        )));
    }
    Ok(response.text().await?)
}
