//! Outcome reporting for a single reconciliation run.
//!
//! A sync that reaches the rewrite is a success even when some propagation
//! pushes fail; those failures ride along in the issue list so callers can
//! show warnings without treating the run as aborted.

use std::fmt;

use crate::model::ServiceKind;

/// Where in the sync pipeline an issue occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    /// Fetching the service's current playlist state
    Fetch,
    /// Pushing the reconciled list back out
    Push,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStage::Fetch => f.write_str("fetch"),
            SyncStage::Push => f.write_str("push"),
        }
    }
}

/// One per-service failure captured during a sync.
#[derive(Debug, Clone)]
pub struct SyncIssue {
    pub service: ServiceKind,
    pub stage: SyncStage,
    pub message: String,
}

/// Result of one reconciliation run over a playlist.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// The canonical playlist that was reconciled
    pub playlist_id: i64,
    /// Which service's snapshot won authoritative selection
    pub authoritative: ServiceKind,
    /// Canonical track count after the rewrite
    pub track_count: usize,
    /// Services that received a successful push (authoritative excluded)
    pub synced_services: Vec<ServiceKind>,
    /// Per-service failures; non-empty means partial
    pub issues: Vec<SyncIssue>,
}

impl SyncReport {
    /// True when every link fetched and every push landed.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "playlist {}: {} tracks from {}, pushed to {} service(s)",
            self.playlist_id,
            self.track_count,
            self.authoritative,
            self.synced_services.len(),
        )?;
        for issue in &self.issues {
            write!(f, "\n  warning: {} {} failed: {}", issue.service, issue.stage, issue.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display_lists_issues() {
        let report = SyncReport {
            playlist_id: 7,
            authoritative: ServiceKind::Spotify,
            track_count: 12,
            synced_services: vec![ServiceKind::AppleMusic],
            issues: vec![SyncIssue {
                service: ServiceKind::YoutubeMusic,
                stage: SyncStage::Push,
                message: "503".into(),
            }],
        };
        assert!(!report.is_clean());
        let text = report.to_string();
        assert!(text.contains("12 tracks from spotify"));
        assert!(text.contains("youtube_music push failed: 503"));
    }
}
