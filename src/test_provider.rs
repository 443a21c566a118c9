//! An in-memory fleet used by the tests.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Mutex,
};

use chrono::{TimeZone, Utc};

use crate::{
    orchestrator::CancelHandle,
    provider::{Provider, ProviderError},
    types::{Instance, InstanceSelector, InstanceState, Page, Snapshot, SnapshotState, Volume, VolumeState},
};

#[derive(Default)]
struct Fleet {
    instances: Vec<Instance>,
    volumes: Vec<Volume>,
    snapshots: HashMap<String, Vec<Snapshot>>,

    fail_stop: HashSet<String>,
    fail_start: HashSet<String>,
    fail_create: HashSet<String>,
    fail_list_instances: Option<ProviderError>,
    throttle_create: u32,
    throttle_describe: u32,
    never_settles: HashSet<String>,
    cancel_after_create: Option<CancelHandle>,

    calls: Vec<String>,
    client_tokens: Vec<(String, String)>,
    next_snapshot: u32,
    list_pages: u32,
}

/// A fake provider. Stop and start settle immediately unless the instance is
/// marked with `never_settles`.
pub struct MemoryProvider {
    fleet: Mutex<Fleet>,
    page_size: usize,
}

impl MemoryProvider {
    pub fn new() -> Self {
        MemoryProvider {
            fleet: Mutex::new(Fleet::default()),
            page_size: 2,
        }
    }

    pub fn with_instance(self, id: &str, project: Option<&str>) -> Self {
        self.with_instance_in_state(id, project, InstanceState::Running)
    }

    pub fn with_instance_in_state(self, id: &str, project: Option<&str>, state: InstanceState) -> Self {
        let mut tags = BTreeMap::new();
        if let Some(p) = project {
            tags.insert("Project".to_string(), p.to_string());
        }
        self.fleet.lock().unwrap().instances.push(Instance {
            id: id.to_string(),
            state,
            availability_zone: "us-east-1a".to_string(),
            instance_type: "t2.micro".to_string(),
            public_dns: Some(format!("{}.compute.example.com", id)),
            tags,
        });
        self
    }

    pub fn with_volume(self, instance_id: &str, volume_id: &str) -> Self {
        self.fleet.lock().unwrap().volumes.push(Volume {
            id: volume_id.to_string(),
            instance_id: instance_id.to_string(),
            state: VolumeState::InUse,
            size_gib: 8,
            encrypted: false,
        });
        self
    }

    /// Adds a snapshot started `minutes` after the epoch of the test clock.
    pub fn with_snapshot(self, volume_id: &str, snapshot_id: &str, state: SnapshotState, minutes: i64) -> Self {
        self.fleet
            .lock()
            .unwrap()
            .snapshots
            .entry(volume_id.to_string())
            .or_default()
            .push(Snapshot {
                id: snapshot_id.to_string(),
                volume_id: volume_id.to_string(),
                state,
                start_time: Utc.timestamp_opt(1_600_000_000 + minutes * 60, 0).unwrap(),
                description: String::new(),
            });
        self
    }

    pub fn fail_stop(self, instance_id: &str) -> Self {
        self.fleet.lock().unwrap().fail_stop.insert(instance_id.to_string());
        self
    }

    pub fn fail_start(self, instance_id: &str) -> Self {
        self.fleet.lock().unwrap().fail_start.insert(instance_id.to_string());
        self
    }

    pub fn fail_create(self, volume_id: &str) -> Self {
        self.fleet.lock().unwrap().fail_create.insert(volume_id.to_string());
        self
    }

    pub fn fail_list_instances(self, err: ProviderError) -> Self {
        self.fleet.lock().unwrap().fail_list_instances = Some(err);
        self
    }

    /// The next `n` create calls are throttled.
    pub fn throttle_create(self, n: u32) -> Self {
        self.fleet.lock().unwrap().throttle_create = n;
        self
    }

    /// The next `n` describe calls are throttled.
    pub fn throttle_describe(self, n: u32) -> Self {
        self.fleet.lock().unwrap().throttle_describe = n;
        self
    }

    /// Cancels the run as soon as the first snapshot has been created.
    pub fn cancel_after_create(self, handle: CancelHandle) -> Self {
        self.fleet.lock().unwrap().cancel_after_create = Some(handle);
        self
    }

    pub fn never_settles(self, instance_id: &str) -> Self {
        self.fleet.lock().unwrap().never_settles.insert(instance_id.to_string());
        self
    }

    /// Every mutating call, in order, as "stop i-1", "snapshot vol-1", ...
    pub fn calls(&self) -> Vec<String> {
        self.fleet.lock().unwrap().calls.clone()
    }

    /// The volume and client token of every create attempt, throttled ones
    /// included.
    pub fn client_tokens(&self) -> Vec<(String, String)> {
        self.fleet.lock().unwrap().client_tokens.clone()
    }

    pub fn list_pages(&self) -> u32 {
        self.fleet.lock().unwrap().list_pages
    }

    pub fn state_of(&self, instance_id: &str) -> Option<InstanceState> {
        let fleet = self.fleet.lock().unwrap();
        fleet.instances.iter().find(|i| i.id == instance_id).map(|i| i.state)
    }

    pub fn snapshots_of(&self, volume_id: &str) -> Vec<Snapshot> {
        let fleet = self.fleet.lock().unwrap();
        fleet.snapshots.get(volume_id).cloned().unwrap_or_default()
    }

    fn transition(&self, instance_id: &str, call: &str, settled: InstanceState, moving: InstanceState) -> Result<(), ProviderError> {
        let mut fleet = self.fleet.lock().unwrap();
        fleet.calls.push(format!("{} {}", call, instance_id));

        let failing = if call == "stop" { &fleet.fail_stop } else { &fleet.fail_start };
        if failing.contains(instance_id) {
            return Err(ProviderError::Rejected(format!("cannot {} {}", call, instance_id)));
        }

        let hangs = fleet.never_settles.contains(instance_id);
        match fleet.instances.iter_mut().find(|i| i.id == instance_id) {
            Some(instance) => {
                instance.state = if hangs { moving } else { settled };
                Ok(())
            }
            None => Err(ProviderError::NotFound(format!("instance {}", instance_id))),
        }
    }
}

#[async_trait::async_trait]
impl Provider for MemoryProvider {
    async fn list_instances(
        &self,
        selector: &InstanceSelector,
        page_token: Option<String>,
    ) -> Result<Page<Instance>, ProviderError> {
        let mut fleet = self.fleet.lock().unwrap();
        if let Some(err) = &fleet.fail_list_instances {
            return Err(err.clone());
        }
        fleet.list_pages += 1;

        let matching: Vec<Instance> = fleet.instances.iter().filter(|i| selector.matches(i)).cloned().collect();
        let start: usize = match page_token {
            Some(t) => t.parse().map_err(|_| ProviderError::Rejected(format!("bad page token {}", t)))?,
            None => 0,
        };
        let end = (start + self.page_size).min(matching.len());
        let next_page = if end < matching.len() { Some(end.to_string()) } else { None };

        Ok(Page {
            items: matching[start.min(end)..end].to_vec(),
            next_page,
        })
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Instance, ProviderError> {
        let mut fleet = self.fleet.lock().unwrap();
        if fleet.throttle_describe > 0 {
            fleet.throttle_describe -= 1;
            return Err(ProviderError::Throttled("RequestLimitExceeded".to_string()));
        }

        fleet
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("instance {}", instance_id)))
    }

    async fn list_volumes(&self, instance_id: &str) -> Result<Vec<Volume>, ProviderError> {
        let fleet = self.fleet.lock().unwrap();
        Ok(fleet.volumes.iter().filter(|v| v.instance_id == instance_id).cloned().collect())
    }

    async fn list_snapshots(&self, volume_id: &str) -> Result<Vec<Snapshot>, ProviderError> {
        let fleet = self.fleet.lock().unwrap();
        Ok(fleet.snapshots.get(volume_id).cloned().unwrap_or_default())
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<(), ProviderError> {
        self.transition(instance_id, "stop", InstanceState::Stopped, InstanceState::Stopping)
    }

    async fn start_instance(&self, instance_id: &str) -> Result<(), ProviderError> {
        self.transition(instance_id, "start", InstanceState::Running, InstanceState::Pending)
    }

    async fn create_snapshot(
        &self,
        volume_id: &str,
        description: &str,
        client_token: &str,
    ) -> Result<Snapshot, ProviderError> {
        let mut fleet = self.fleet.lock().unwrap();
        fleet
            .client_tokens
            .push((volume_id.to_string(), client_token.to_string()));
        if fleet.throttle_create > 0 {
            fleet.throttle_create -= 1;
            return Err(ProviderError::Throttled("RequestLimitExceeded".to_string()));
        }

        fleet.calls.push(format!("snapshot {}", volume_id));
        if fleet.fail_create.contains(volume_id) {
            return Err(ProviderError::Rejected(format!("volume {} is not snapshottable", volume_id)));
        }

        fleet.next_snapshot += 1;
        let snapshot = Snapshot {
            id: format!("snap-{}", fleet.next_snapshot),
            volume_id: volume_id.to_string(),
            state: SnapshotState::Pending,
            start_time: Utc::now(),
            description: description.to_string(),
        };
        fleet
            .snapshots
            .entry(volume_id.to_string())
            .or_default()
            .insert(0, snapshot.clone());

        if let Some(handle) = fleet.cancel_after_create.take() {
            handle.cancel();
        }

        Ok(snapshot)
    }
}
