//! Where batches come from.
//!
//! Fetching the observation product and parsing it happen elsewhere; by the time records
//! reach the loader they are complete [`WeatherStationObservation`]s.

use std::path::PathBuf;

use observations::WeatherStationObservation;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read observations from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("observations in {path:?} are malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait ObservationSource {
    /// one finite, ordered batch
    async fn load_observations(&self) -> Result<Vec<WeatherStationObservation>, SourceError>;
}

/// A JSON array of records on disk
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ObservationSource for JsonFileSource {
    #[instrument(skip(self), fields(path = ?self.path))]
    async fn load_observations(&self) -> Result<Vec<WeatherStationObservation>, SourceError> {
        info!("Loading observation data from {:?}", self.path);
        let buf = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Read {
                path: self.path.clone(),
                source,
            })?;
        let observations: Vec<WeatherStationObservation> =
            serde_json::from_str(&buf).map_err(|source| SourceError::Parse {
                path: self.path.clone(),
                source,
            })?;
        info!(
            "Completed loading {} observations from {:?}",
            observations.len(),
            self.path
        );
        Ok(observations)
    }
}
