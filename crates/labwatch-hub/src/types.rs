//! Wire types for the hub API.
//!
//! These mirror the hub's JSON representations. The agent only ever
//! observes snapshots of watchdog state; the hub owns the records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of a job, the outermost unit of scheduled work.
pub type JobId = u64;

/// Identifier of a recipe, one machine's slice of a job.
pub type RecipeId = u64;

/// Identifier of a task within a recipe.
pub type TaskId = u64;

/// Fully qualified name of a machine under test.
pub type SystemId = String;

/// A hub-side watchdog timer bound to a running recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogEntry {
    /// Machine the recipe is running on.
    pub system: SystemId,
    /// Recipe the watchdog is bound to.
    pub recipe_id: RecipeId,
    /// Task currently executing within the recipe.
    pub task_id: TaskId,
    /// Instant at which the watchdog fires.
    pub expiry: DateTime<Utc>,
}

/// How a recipe or job should be stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopType {
    /// Hard stop; the work is considered failed.
    Abort,
    /// Orderly stop requested by an operator.
    Cancel,
}

impl StopType {
    /// Wire name of the stop type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Cancel => "cancel",
        }
    }
}

/// Outcome reported for a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// Task completed successfully.
    Pass,
    /// Task completed with warnings.
    Warn,
    /// Task failed.
    Fail,
    /// Task died to a kernel fault or equivalent.
    Panic,
}

impl ResultType {
    /// Wire name of the result type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Panic => "panic",
        }
    }
}

/// A result record to attach to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Outcome being reported.
    pub result: ResultType,
    /// Result path within the task, `/` for the task itself.
    pub path: String,
    /// Optional numeric score.
    pub score: Option<f64>,
    /// Optional one-line summary.
    pub summary: Option<String>,
}

/// Byte position of a chunk within its destination file.
///
/// The wire protocol encodes the offset as a signed integer where `-1`
/// marks the final chunk of a file and every other value is a true byte
/// position. Modelling the sentinel as its own variant keeps data chunks
/// from carrying it by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOffset {
    /// Data chunk starting at this byte position.
    Data(u64),
    /// No more chunks will follow for this file.
    Final,
}

impl ChunkOffset {
    /// Returns true for the final-chunk sentinel.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Final)
    }
}

impl Serialize for ChunkOffset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::Data(position) => {
                let position = i64::try_from(position).map_err(|_| {
                    serde::ser::Error::custom(format!("chunk offset out of range: {position}"))
                })?;
                serializer.serialize_i64(position)
            }
            Self::Final => serializer.serialize_i64(-1),
        }
    }
}

impl<'de> Deserialize<'de> for ChunkOffset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        match raw {
            -1 => Ok(Self::Final),
            n => u64::try_from(n)
                .map(Self::Data)
                .map_err(|_| serde::de::Error::custom(format!("invalid chunk offset: {n}"))),
        }
    }
}

/// One chunk of log content in the upload protocol.
///
/// `size` and `md5` describe this chunk's own bytes, not the whole file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogChunk {
    /// Destination path of the log, relative to the owning recipe.
    pub path: String,
    /// File name within `path`.
    pub name: String,
    /// Size of this chunk in bytes.
    pub size: u64,
    /// Hex md5 digest of this chunk's raw bytes.
    pub md5: String,
    /// Byte position of the chunk, or the final-chunk sentinel.
    pub offset: ChunkOffset,
    /// Base64-encoded chunk bytes.
    pub data: String,
}
