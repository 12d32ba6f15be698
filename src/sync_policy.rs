// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Post-transmission decisions: commit, rollback, watermark advance.

use crate::synchronizer::SyncStatus;
use crate::item::Timestamp;

pub struct SyncPolicy;

impl SyncPolicy {
    /// Commit only after every eligible item was transmitted.
    pub fn should_commit(status: SyncStatus) -> bool {
        status == SyncStatus::PreCommitDataTransmittedSuccessfully
    }

    /// Roll back anything not committed, and any attempt that failed or was
    /// aborted even if a commit was reported.
    pub fn should_roll_back(status: SyncStatus, committed: bool) -> bool {
        !committed || matches!(status, SyncStatus::UnexpectedError | SyncStatus::Aborted)
    }

    /// Advance the watermark only for a committed attempt that applied items.
    pub fn should_update_last_sync_at(committed: bool, last_updated_at: Option<Timestamp>) -> bool {
        committed && last_updated_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const ALL: [SyncStatus; 6] = [
        SyncStatus::NotStarted,
        SyncStatus::Running,
        SyncStatus::PreCommitDataTransmittedSuccessfully,
        SyncStatus::UnexpectedError,
        SyncStatus::Conflict,
        SyncStatus::Aborted,
    ];

    #[test]
    fn test_should_commit_only_after_transmission() {
        for status in ALL {
            assert_eq!(
                SyncPolicy::should_commit(status),
                status == SyncStatus::PreCommitDataTransmittedSuccessfully,
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_uncommitted_always_rolls_back() {
        for status in ALL {
            assert!(SyncPolicy::should_roll_back(status, false), "status {}", status);
        }
    }

    #[test]
    fn test_committed_rolls_back_only_on_failure_or_abort() {
        assert!(!SyncPolicy::should_roll_back(
            SyncStatus::PreCommitDataTransmittedSuccessfully,
            true
        ));
        assert!(!SyncPolicy::should_roll_back(SyncStatus::Conflict, true));
        assert!(SyncPolicy::should_roll_back(SyncStatus::UnexpectedError, true));
        assert!(SyncPolicy::should_roll_back(SyncStatus::Aborted, true));
    }

    #[test]
    fn test_should_update_last_sync_at() {
        let now = Some(Utc::now());
        assert!(SyncPolicy::should_update_last_sync_at(true, now));
        assert!(!SyncPolicy::should_update_last_sync_at(true, None));
        assert!(!SyncPolicy::should_update_last_sync_at(false, now));
        assert!(!SyncPolicy::should_update_last_sync_at(false, None));
    }
}
