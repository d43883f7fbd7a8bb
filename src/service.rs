use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::error::{BuildError, CycleError, FatalError};
use crate::fetcher::{FetchSettings, Fetcher};
use crate::influx::{InfluxSink, RecordSink};
use crate::keys::KeyPool;
use crate::records::RecordBuilder;
use crate::registry::LocationRegistry;
use crate::transport::ReqwestTransport;

/// Polls every configured location once per cycle and writes the
/// resulting records as a single batch.
pub struct Poller {
    locations: LocationRegistry,
    keys: KeyPool,
    fetcher: Fetcher,
    builder: RecordBuilder,
    sink: Arc<dyn RecordSink>,
}

impl Poller {
    /// Assembles a poller from already-built parts
    pub fn new(
        locations: LocationRegistry,
        keys: KeyPool,
        fetcher: Fetcher,
        builder: RecordBuilder,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        if locations.is_empty() {
            tracing::warn!("No locations configured; nothing will be polled");
        } else {
            tracing::debug!("Registered {} location(s)", locations.len());
        }
        Self {
            locations,
            keys,
            fetcher,
            builder,
            sink,
        }
    }

    /// Wires up the production IQAir transport and InfluxDB sink
    pub fn from_config(config: &Config) -> Result<Self> {
        let iqair = &config.iqair;
        let settings = FetchSettings {
            retry_max_count: iqair.throttle_retry_max_count,
            wait_max_seconds: iqair.throttle_wait_max_seconds,
        };
        let transport = Arc::new(ReqwestTransport::new().context("failed to build HTTP client")?);
        let fetcher = Fetcher::new(transport, &iqair.api, settings)?;
        let keys = KeyPool::new(iqair.apikeys.clone()).context("no IQAir API key configured")?;
        let builder = RecordBuilder::new(
            iqair.measurement_weather.clone(),
            iqair.measurement_pollution.clone(),
        );
        let locations = LocationRegistry::from_config(&iqair.locations);
        let sink = Arc::new(InfluxSink::new(&config.influx)?);

        Ok(Self::new(locations, keys, fetcher, builder, sink))
    }

    /// Runs one polling cycle and returns the number of records handed to
    /// the sink.
    ///
    /// Stops at the first fatal upstream error without writing anything.
    pub async fn run_cycle(&mut self) -> Result<usize, CycleError> {
        let mut keys = self.keys.clone();
        let mut records = Vec::new();

        for location in self.locations.iter() {
            let Some(reading) = self.fetcher.fetch(location, &mut keys).await? else {
                continue;
            };
            match self.builder.build(&reading, location) {
                Ok(mut built) => records.append(&mut built),
                Err(BuildError::Unsuccessful { message }) => {
                    tracing::error!("Unsuccessful call for {}: {}", location.name, message);
                }
                Err(e) => {
                    tracing::error!("Skipping {}: {:#}", location.name, anyhow::Error::new(e));
                }
            }
        }

        self.sink.write(&records).await?;
        Ok(records.len())
    }

    /// Runs cycles every `loop_seconds`, or once when it is 0.
    ///
    /// Only a fatal upstream error ends the loop early.
    pub async fn run(&mut self, loop_seconds: u64) -> Result<(), FatalError> {
        loop {
            match self.run_cycle().await {
                Ok(count) => tracing::debug!(
                    "Cycle finished with {} record(s), throttle count {}",
                    count,
                    self.fetcher.throttle().count()
                ),
                Err(CycleError::Fatal(e)) => return Err(e),
                Err(e) => tracing::error!("Polling cycle failed: {:#}", anyhow::Error::new(e)),
            }

            if loop_seconds == 0 {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_secs(loop_seconds)).await;
        }
    }
}
