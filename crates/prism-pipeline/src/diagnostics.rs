//! Batch diagnostics: what ran, how long it took, and the synchronization
//! counts each strategy observed.
//!
//! Reports serialize with serde; durations are written as
//! fractional seconds.

use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Strategy;

/// Durations on the wire: seconds as an `f64`.
pub(crate) mod seconds {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(elapsed.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Duration::try_from_secs_f64(f64::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Data-directory tag of the batch.
    pub tag: String,
    /// Strategy that executed the batch.
    pub strategy: Strategy,
    /// Worker count used (1 for sequential).
    pub workers: usize,
    /// Number of images persisted.
    pub images: usize,
    /// Number of effect stages executed across all images.
    pub stages: usize,
    /// Wall-clock duration from first decode to last encode (seconds).
    #[serde(with = "seconds")]
    pub elapsed: Duration,
    /// BSP only: completion signals observed by the driver before it
    /// started persisting.
    pub join_signals: Option<usize>,
    /// Pipeline only: tiles composited across all stage fan-ins.
    pub tiles_composited: Option<usize>,
}

impl BatchReport {
    /// Render a human-readable summary.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{tag}: {strategy} x{workers}",
            tag = self.tag,
            strategy = self.strategy,
            workers = self.workers,
        );
        let _ = writeln!(out, "{}", "-".repeat(40));
        let _ = writeln!(out, "{:<20} {:>12}", "Images", self.images);
        let _ = writeln!(out, "{:<20} {:>12}", "Stages", self.stages);
        if let Some(signals) = self.join_signals {
            let _ = writeln!(out, "{:<20} {:>12}", "Join signals", signals);
        }
        if let Some(tiles) = self.tiles_composited {
            let _ = writeln!(out, "{:<20} {:>12}", "Tiles composited", tiles);
        }
        let _ = write!(
            out,
            "{:<20} {:>10.3}s",
            "Elapsed",
            self.elapsed.as_secs_f64()
        );
        out
    }
}
