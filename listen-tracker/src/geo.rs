//! Best-effort listener geolocation
//!
//! Looked up once per session start. A failed lookup yields an empty
//! location; it never fails the start record.

use crate::config::GeolocationConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoLocation {
    pub country: Option<String>,
    pub city: Option<String>,
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Resolve the listener's location; empty on any failure
    async fn locate(&self) -> GeoLocation;
}

/// Locator used when geolocation is disabled
#[derive(Debug, Default)]
pub struct NoopLocator;

#[async_trait]
impl GeoLocator for NoopLocator {
    async fn locate(&self) -> GeoLocation {
        GeoLocation::default()
    }
}

/// Reverse-IP lookup against a JSON endpoint returning `country_name`/`city`
pub struct IpApiLocator {
    http_client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    country_name: Option<String>,
    city: Option<String>,
}

impl IpApiLocator {
    pub fn new(config: &GeolocationConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
        })
    }

    async fn fetch(&self) -> Result<GeoLocation> {
        let response = self.http_client.get(&self.endpoint).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Internal(format!(
                "Geolocation endpoint returned {}",
                status.as_u16()
            )));
        }

        let body: IpApiResponse = response.json().await?;
        Ok(GeoLocation {
            country: body.country_name.filter(|s| !s.is_empty()),
            city: body.city.filter(|s| !s.is_empty()),
        })
    }
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    async fn locate(&self) -> GeoLocation {
        match self.fetch().await {
            Ok(location) => location,
            Err(e) => {
                debug!(endpoint = %self.endpoint, "Geolocation lookup failed: {}", e);
                GeoLocation::default()
            }
        }
    }
}

/// Build the locator selected by the configuration
pub fn locator_from_config(config: &GeolocationConfig) -> Result<Box<dyn GeoLocator>> {
    if config.enabled {
        Ok(Box::new(IpApiLocator::new(config)?))
    } else {
        Ok(Box::new(NoopLocator))
    }
}
