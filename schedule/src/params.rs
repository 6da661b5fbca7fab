//! Tuned schedule parameters.
//!
//! A read-only table from a shape-signature key to named split factors, e.g.
//!
//! ```json
//! {
//!   "CudaDirectConvSchedule 1 16 10 10 32 16 3 3 1 32 8 8": {
//!     "f": [-1, 2, 4, 2], "y": [-1, 1, 4, 2], "x": [-1, 1, 8, 1],
//!     "rc": [-1, 4], "ry": [-1, 3], "rx": [-1, 1]
//!   }
//! }
//! ```
//!
//! The table is loaded once by the driver and passed to the composite
//! schedules that consult it.

use std::collections::HashMap;
use std::path::Path;

use bon::bon;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use tracing::debug;

/// Split factors of one tuned configuration, by loop role.
pub type ParamEntry = HashMap<String, Vec<i64>>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ParamsError {
    #[snafu(display("failed to read schedule params from {path}: {source}"))]
    Read { path: String, source: std::io::Error },

    #[snafu(display("malformed schedule params: {source}"))]
    Parse { source: serde_json::Error },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleParams {
    table: HashMap<String, ParamEntry>,
}

#[bon]
impl ScheduleParams {
    #[builder]
    pub fn builder(#[builder(default)] entries: Vec<(String, ParamEntry)>) -> Self {
        Self { table: entries.into_iter().collect() }
    }

    pub fn from_json(json: &str) -> Result<Self, ParamsError> {
        serde_json::from_str(json).context(ParseSnafu)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParamsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).context(ReadSnafu { path: path.display().to_string() })?;
        let params = Self::from_json(&json)?;
        debug!(path = %path.display(), entries = params.len(), "loaded schedule params");
        Ok(params)
    }

    /// Params from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `STRATA_SCHEDULE_PARAMS` - Path to a JSON table (default: empty table)
    pub fn from_env() -> Result<Self, ParamsError> {
        match std::env::var("STRATA_SCHEDULE_PARAMS") {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamEntry> {
        self.table.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: ParamEntry) {
        self.table.insert(key.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn to_json(&self) -> Result<String, ParamsError> {
        serde_json::to_string_pretty(self).context(ParseSnafu)
    }
}

/// Key of the direct convolution table: padded input, weights and output dims.
pub fn conv_key(pad_shape: &[i64], weight_shape: &[i64], out_shape: &[i64]) -> String {
    let dims: Vec<String> = pad_shape.iter().chain(weight_shape).chain(out_shape).map(i64::to_string).collect();
    format!("CudaDirectConvSchedule {}", dims.join(" "))
}
