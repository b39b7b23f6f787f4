use serde::{Deserialize, Serialize};

/// Request priority (matches Chromium's RequestPriority).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum RequestPriority {
    Throttled = 0,
    /// Chromium's `DEFAULT_PRIORITY`; PAC lookups run here.
    #[default]
    Idle = 1,
    Lowest = 2,
    Low = 3,
    Medium = 4,
    Highest = 5,
}
