use crate::{
    provider::{retry, Provider, ProviderError, RetryPolicy},
    types::{Snapshot, SnapshotState, Volume},
};

/// Orders snapshots most recent first by start time. Snapshots started at
/// the same instant keep the order the provider returned them in.
pub fn sort_most_recent_first(snapshots: &mut [Snapshot]) {
    snapshots.sort_by(|a, b| b.start_time.cmp(&a.start_time));
}

/// Returns true if the most recent snapshot of the volume is still pending.
pub async fn has_pending_snapshot(
    provider: &dyn Provider,
    retry_policy: &RetryPolicy,
    volume: &Volume,
) -> Result<bool, ProviderError> {
    let mut snapshots = retry(retry_policy, || provider.list_snapshots(&volume.id)).await?;
    sort_most_recent_first(&mut snapshots);

    Ok(is_pending(snapshots.first()))
}

fn is_pending(most_recent: Option<&Snapshot>) -> bool {
    matches!(most_recent, Some(s) if s.state == SnapshotState::Pending)
}

/// The snapshots shown by `snapshots list`: most recent first, and unless
/// `all` is set, nothing older than the newest completed snapshot.
pub fn most_recent_view(mut snapshots: Vec<Snapshot>, all: bool) -> Vec<Snapshot> {
    sort_most_recent_first(&mut snapshots);
    if all {
        return snapshots;
    }

    match snapshots.iter().position(|s| s.state == SnapshotState::Completed) {
        Some(i) => {
            snapshots.truncate(i + 1);
            snapshots
        }
        None => snapshots,
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_provider::MemoryProvider;

    pub struct TestItem {
        name: String,
        provider: MemoryProvider,
        want: bool,
    }

    fn volume(id: &str) -> Volume {
        Volume {
            id: id.to_string(),
            instance_id: "i-1".to_string(),
            state: crate::types::VolumeState::InUse,
            size_gib: 8,
            encrypted: true,
        }
    }

    #[tokio::test]
    async fn test_has_pending_snapshot() {
        let tests = vec![
            TestItem {
                name: "no snapshots".to_string(),
                provider: MemoryProvider::new(),
                want: false,
            },
            TestItem {
                name: "latest pending".to_string(),
                provider: MemoryProvider::new()
                    .with_snapshot("vol-1", "snap-2", SnapshotState::Pending, 20)
                    .with_snapshot("vol-1", "snap-1", SnapshotState::Completed, 10),
                want: true,
            },
            TestItem {
                name: "latest completed".to_string(),
                provider: MemoryProvider::new()
                    .with_snapshot("vol-1", "snap-2", SnapshotState::Completed, 20)
                    .with_snapshot("vol-1", "snap-1", SnapshotState::Pending, 10),
                want: false,
            },
            TestItem {
                name: "provider returns oldest first".to_string(),
                provider: MemoryProvider::new()
                    .with_snapshot("vol-1", "snap-1", SnapshotState::Completed, 10)
                    .with_snapshot("vol-1", "snap-2", SnapshotState::Pending, 20),
                want: true,
            },
            TestItem {
                name: "latest errored".to_string(),
                provider: MemoryProvider::new().with_snapshot("vol-1", "snap-1", SnapshotState::Error, 10),
                want: false,
            },
            TestItem {
                name: "other volume pending".to_string(),
                provider: MemoryProvider::new().with_snapshot("vol-2", "snap-1", SnapshotState::Pending, 10),
                want: false,
            },
        ];

        for t in tests {
            let got = has_pending_snapshot(&t.provider, &RetryPolicy::none(), &volume("vol-1"))
                .await
                .unwrap();
            assert_eq!(got, t.want, "test {}", t.name);
        }
    }

    #[tokio::test]
    async fn test_most_recent_view() {
        let provider = MemoryProvider::new()
            .with_snapshot("vol-1", "snap-3", SnapshotState::Pending, 30)
            .with_snapshot("vol-1", "snap-2", SnapshotState::Completed, 20)
            .with_snapshot("vol-1", "snap-1", SnapshotState::Completed, 10);
        let snapshots = provider.list_snapshots("vol-1").await.unwrap();

        let ids = |v: Vec<Snapshot>| v.into_iter().map(|s| s.id).collect::<Vec<_>>();

        assert_eq!(ids(most_recent_view(snapshots.clone(), false)), vec!["snap-3", "snap-2"]);
        assert_eq!(
            ids(most_recent_view(snapshots, true)),
            vec!["snap-3", "snap-2", "snap-1"]
        );
    }

    #[test]
    fn test_most_recent_view_without_completed() {
        let provider = MemoryProvider::new()
            .with_snapshot("vol-1", "snap-1", SnapshotState::Error, 10)
            .with_snapshot("vol-1", "snap-2", SnapshotState::Pending, 20);

        let view = most_recent_view(provider.snapshots_of("vol-1"), false);
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].id, "snap-2");
    }
}
