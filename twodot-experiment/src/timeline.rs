use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use twodot_core::{TrialError, TrialSpec};

use crate::registry::TrialRegistry;

/// Entries handled outside the trial core.
const PRELOAD: &str = "preload";

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub trial_type: String,
    pub spec: TrialSpec,
}

/// Ordered list of trials making up one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

#[derive(Debug, Deserialize)]
struct TimelineFile {
    timeline: Vec<Value>,
}

impl Timeline {
    pub fn new(entries: Vec<TimelineEntry>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path, registry: &TrialRegistry) -> Result<Self, TrialError> {
        let text = std::fs::read_to_string(path)?;
        let timeline = Self::from_json(&text, registry)?;
        info!("Loaded {} trials from {}", timeline.len(), path.display());
        Ok(timeline)
    }

    /// Parses `{ "timeline": [ { "type": ..., ...params } ] }`. Specs are
    /// only parsed here; validation happens when a trial is constructed.
    pub fn from_json(text: &str, registry: &TrialRegistry) -> Result<Self, TrialError> {
        let file: TimelineFile =
            serde_json::from_str(text).map_err(|e| TrialError::Timeline(e.to_string()))?;

        let mut entries = Vec::with_capacity(file.timeline.len());
        for (i, value) in file.timeline.iter().enumerate() {
            let trial_type = value
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| TrialError::Timeline(format!("entry {i} has no \"type\"")))?;

            if trial_type == PRELOAD {
                debug!("Skipping preload entry {}", i);
                continue;
            }

            let spec = registry.build(trial_type, value).map_err(|e| match e {
                TrialError::Timeline(msg) => TrialError::Timeline(format!("entry {i}: {msg}")),
                other => other,
            })?;
            entries.push(TimelineEntry {
                trial_type: trial_type.to_string(),
                spec,
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&TimelineEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
