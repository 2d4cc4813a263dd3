//! Explicit configuration handed to the workflow components.

use std::path::PathBuf;
use std::time::Duration;

use forge3d_core::error::CoreError;
use forge3d_core::output::{ModelExtensions, DEFAULT_FALLBACK_SUBFOLDER_MARKER};
use forge3d_core::template::SlotId;

/// Default backend address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8188";

/// Default seconds between status queries.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Default overall wait for a job, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default node IDs of the three `LoadImage` slots.
pub const DEFAULT_SLOT_FRONT: &str = "56";
pub const DEFAULT_SLOT_LEFT: &str = "78";
pub const DEFAULT_SLOT_BACK: &str = "80";

/// One of the three camera views accepted per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputView {
    Front,
    Left,
    Back,
}

impl InputView {
    /// All views in slot-binding order.
    pub const ALL: [InputView; 3] = [InputView::Front, InputView::Left, InputView::Back];

    /// Multipart form field carrying this view.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Left => "left",
            Self::Back => "back",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.field_name() == name)
    }
}

/// Template node IDs receiving each view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMap {
    pub front: SlotId,
    pub left: SlotId,
    pub back: SlotId,
}

impl SlotMap {
    pub fn new(
        front: impl Into<String>,
        left: impl Into<String>,
        back: impl Into<String>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            front: SlotId::new(front)?,
            left: SlotId::new(left)?,
            back: SlotId::new(back)?,
        })
    }

    pub fn slot(&self, view: InputView) -> &SlotId {
        match view {
            InputView::Front => &self.front,
            InputView::Left => &self.left,
            InputView::Back => &self.back,
        }
    }
}

impl Default for SlotMap {
    fn default() -> Self {
        Self {
            front: SlotId::from_static(DEFAULT_SLOT_FRONT),
            left: SlotId::from_static(DEFAULT_SLOT_LEFT),
            back: SlotId::from_static(DEFAULT_SLOT_BACK),
        }
    }
}

/// Fixed-interval polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between two status queries.
    pub interval: Duration,
    /// Upper bound on the total wait.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Everything the pipeline needs to run a job.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Backend HTTP base URL.
    pub base_url: String,
    /// Job template document.
    pub template_path: PathBuf,
    /// Directory for uploaded inputs and downloaded artifacts.
    pub output_dir: PathBuf,
    pub poll: PollConfig,
    pub slots: SlotMap,
    /// Extensions accepted when scanning job outputs.
    pub model_extensions: ModelExtensions,
    /// Substring required of subfolders in the fallback listing search.
    pub fallback_subfolder_marker: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            template_path: PathBuf::from("workflows/3d-mdl-2.json"),
            output_dir: PathBuf::from("outputs"),
            poll: PollConfig::default(),
            slots: SlotMap::default(),
            model_extensions: ModelExtensions::default(),
            fallback_subfolder_marker: DEFAULT_FALLBACK_SUBFOLDER_MARKER.to_string(),
        }
    }
}
