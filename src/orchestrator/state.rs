use std::fmt;

/// Where a single launch request currently stands.
///
/// ```text
/// Requested → Creating → [ImagePulling → Creating(retry)] → Created → Starting → Running
///                  └──────────────────────┴──────────────────────────────┴──────→ Failed
/// ```
///
/// `ImagePulling` is entered at most once per request. `Creating` may repeat
/// once when a conflicting container disappears before it can be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    Requested,
    Creating { retry: bool },
    ImagePulling,
    Created,
    Starting,
    Running,
    Failed,
}

impl LaunchPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, LaunchPhase::Running | LaunchPhase::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: LaunchPhase) -> bool {
        use LaunchPhase::*;
        match (self, next) {
            (_, Failed) => !self.is_terminal(),
            (Requested, Creating { retry: false }) => true,
            (Creating { retry: false }, ImagePulling) => true,
            // name freed up between a conflict and the lookup
            (Creating { retry: a }, Creating { retry: b }) => a == b,
            (ImagePulling, Creating { retry: true }) => true,
            (Creating { .. }, Created) => true,
            (Created, Starting) => true,
            (Starting, Running) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchPhase::Requested => write!(f, "requested"),
            LaunchPhase::Creating { retry: false } => write!(f, "creating"),
            LaunchPhase::Creating { retry: true } => write!(f, "creating (retry)"),
            LaunchPhase::ImagePulling => write!(f, "image-pulling"),
            LaunchPhase::Created => write!(f, "created"),
            LaunchPhase::Starting => write!(f, "starting"),
            LaunchPhase::Running => write!(f, "running"),
            LaunchPhase::Failed => write!(f, "failed"),
        }
    }
}
