//! Replay of recorded acceleration streams.
//!
//! A recording is a JSON-lines file with one `{"x":..,"y":..,"z":..}` object
//! per line. Blank lines are skipped. Playback loops at end of file.

use crate::sensor::types::{Acceleration, AccelerationSource, SensorError};
use std::path::PathBuf;

/// Accelerometer that plays back a recorded stream.
pub struct ReplayAccelerometer {
    path: Option<PathBuf>,
    samples: Vec<Acceleration>,
    position: usize,
}

impl ReplayAccelerometer {
    /// Create a replay source backed by a file, loaded on [`begin`](AccelerationSource::begin).
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            samples: Vec::new(),
            position: 0,
        }
    }

    /// Create a replay source from samples already in memory.
    pub fn from_samples(samples: Vec<Acceleration>) -> Self {
        Self {
            path: None,
            samples,
            position: 0,
        }
    }

    /// Parse a JSON-lines recording.
    pub fn parse(content: &str) -> Result<Vec<Acceleration>, SensorError> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<Acceleration>(line).map_err(|e| {
                    SensorError::Unavailable(format!("recording line {}: {e}", n + 1))
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl AccelerationSource for ReplayAccelerometer {
    fn begin(&mut self) -> Result<(), SensorError> {
        if let Some(ref path) = self.path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                SensorError::Unavailable(format!("cannot open recording {path:?}: {e}"))
            })?;
            self.samples = Self::parse(&content)?;
        }
        if self.samples.is_empty() {
            return Err(SensorError::Unavailable("recording is empty".to_string()));
        }
        self.position = 0;
        Ok(())
    }

    fn read_acceleration(&mut self) -> Result<Acceleration, SensorError> {
        if self.samples.is_empty() {
            return Err(SensorError::ReadFailed("no recording loaded".to_string()));
        }
        let sample = self.samples[self.position];
        self.position = (self.position + 1) % self.samples.len();
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recording() {
        let content = "{\"x\":0.1,\"y\":0.2,\"z\":9.8}\n\n{\"x\":0.0,\"y\":0.0,\"z\":9.7}\n";
        let samples = ReplayAccelerometer::parse(content).unwrap();
        assert_eq!(samples.len(), 2);
        assert!((samples[0].z - 9.8).abs() < 1e-12);
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let err = ReplayAccelerometer::parse("{\"x\":1}\nnot json").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_replay_loops() {
        let mut source = ReplayAccelerometer::from_samples(vec![
            Acceleration::new(1.0, 0.0, 0.0),
            Acceleration::new(2.0, 0.0, 0.0),
        ]);
        source.begin().unwrap();
        let xs: Vec<f64> = (0..5)
            .map(|_| source.read_acceleration().unwrap().x)
            .collect();
        assert_eq!(xs, vec![1.0, 2.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let mut source = ReplayAccelerometer::from_path("/nonexistent/recording.jsonl");
        assert!(matches!(source.begin(), Err(SensorError::Unavailable(_))));
    }

    #[test]
    fn test_empty_recording_is_unavailable() {
        let mut source = ReplayAccelerometer::from_samples(Vec::new());
        assert!(source.begin().is_err());
    }
}
