//! Test support utilities shared across unit and integration tests.
//!
//! [`FakeGateway`] is an in-memory control plane implementing
//! [`Gateway`]. It enforces the same rules as the remote side (mount points
//! must be cleared before removal, duplicate keys are rejected, capacity is
//! bounded), records every call, and can be scripted to fail or to lag behind
//! after creation. [`EnvGuard`] serialises environment mutation for
//! configuration tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::time::Instant;

use crate::gateway::{
    CreateVolumeRequest, CreatedVolume, ErrorKind, Gateway, GatewayError, GatewayFuture,
    MountPointPage, MountPointRequest, Operation, RawMountPoint, RawVolume,
    UpdateVolumeInfoRequest, VolumePage, VolumeQuery,
};
use crate::model::{MountPointKey, MountPointSpec, VolumeId, VolumeSpec};

const DEFAULT_MAX_MOUNT_POINTS: u32 = 5;
const STATUS_CREATING: &str = "Creating";
const STATUS_AVAILABLE: &str = "Available";

/// Records a single call made through [`FakeGateway`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GatewayCall {
    /// Operation invoked.
    pub operation: Operation,
    /// Human readable target, for example a volume id or mount point key.
    pub target: String,
    /// Time of the call on the tokio clock.
    pub at: Instant,
}

#[derive(Clone, Debug)]
struct Fault {
    operation: Operation,
    kind: ErrorKind,
    applied: bool,
}

#[derive(Clone, Debug)]
struct FakeVolume {
    raw: RawVolume,
    mount_points: BTreeMap<MountPointKey, RawMountPoint>,
    reads_until_ready: u32,
    reads_until_visible: u32,
}

#[derive(Debug, Default)]
struct FakeState {
    volumes: BTreeMap<String, FakeVolume>,
    next_id: u64,
    faults: VecDeque<Fault>,
    calls: Vec<GatewayCall>,
    readiness_lag: u32,
    visibility_lag: u32,
    max_mount_points: Option<u32>,
    total_count_override: Option<u64>,
}

impl FakeState {
    fn take_fault(&mut self, operation: Operation) -> Option<Fault> {
        let index = self
            .faults
            .iter()
            .position(|fault| fault.operation == operation)?;
        self.faults.remove(index)
    }

    fn max_mount_points(&self) -> u32 {
        self.max_mount_points.unwrap_or(DEFAULT_MAX_MOUNT_POINTS)
    }

    fn volume_mut(
        &mut self,
        operation: Operation,
        volume_id: &str,
    ) -> Result<&mut FakeVolume, GatewayError> {
        self.volumes.get_mut(volume_id).ok_or_else(|| {
            GatewayError::new(
                operation,
                ErrorKind::NotFound,
                format!("volume {volume_id} does not exist"),
            )
        })
    }

    fn insert_volume(
        &mut self,
        mut raw: RawVolume,
        reads_until_ready: u32,
        reads_until_visible: u32,
    ) -> String {
        self.next_id += 1;
        let volume_id = format!("vol-{:04}", self.next_id);
        raw.volume_id.clone_from(&volume_id);
        self.volumes.insert(
            volume_id.clone(),
            FakeVolume {
                raw,
                mount_points: BTreeMap::new(),
                reads_until_ready,
                reads_until_visible,
            },
        );
        volume_id
    }
}

/// In-memory control plane used by tests.
#[derive(Clone, Debug, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    /// Creates an empty control plane.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a ready volume matching `spec` and returns its identifier.
    #[must_use]
    pub fn seed_volume(&self, spec: &VolumeSpec) -> VolumeId {
        let raw = raw_volume(
            spec.name.clone().unwrap_or_else(|| String::from("seeded")),
            spec,
        );
        VolumeId::new(self.lock().insert_volume(raw, 0, 0))
    }

    /// Attaches a mount point to a seeded volume without recording a call.
    pub fn seed_mount_point(&self, volume_id: &VolumeId, spec: &MountPointSpec) {
        let mut state = self.lock();
        if let Some(volume) = state.volumes.get_mut(volume_id.as_str()) {
            volume
                .mount_points
                .insert(spec.key(), raw_mount_point(&spec.key(), &spec.name));
        }
    }

    /// Sets the mount point capacity reported for every volume.
    pub fn set_max_mount_points(&self, maximum: u32) {
        self.lock().max_mount_points = Some(maximum);
    }

    /// New volumes report a `Creating` status for this many reads.
    pub fn set_readiness_lag(&self, reads: u32) {
        self.lock().readiness_lag = reads;
    }

    /// New volumes are missing from listings for this many reads.
    pub fn set_visibility_lag(&self, reads: u32) {
        self.lock().visibility_lag = reads;
    }

    /// Reports this total count on every listing regardless of contents.
    pub fn override_total_count(&self, total: u64) {
        self.lock().total_count_override = Some(total);
    }

    /// Fails the next call of `operation` with `kind` without applying it.
    pub fn fail_next(&self, operation: Operation, kind: ErrorKind) {
        self.fail_times(operation, kind, 1);
    }

    /// Fails the next `times` calls of `operation` with `kind`.
    pub fn fail_times(&self, operation: Operation, kind: ErrorKind, times: u32) {
        let mut state = self.lock();
        for _ in 0..times {
            state.faults.push_back(Fault {
                operation,
                kind,
                applied: false,
            });
        }
    }

    /// Applies the next call of `operation` and then reports `kind`, as when
    /// a response is lost after the control plane acted on the request.
    pub fn fail_after_apply(&self, operation: Operation, kind: ErrorKind) {
        self.lock().faults.push_back(Fault {
            operation,
            kind,
            applied: true,
        });
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls of `operation`.
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Recorded calls that mutate remote state.
    #[must_use]
    pub fn mutations(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|call| {
                !matches!(
                    call.operation,
                    Operation::ReadVolumes | Operation::ReadMountPoints
                )
            })
            .collect()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of volumes currently held.
    #[must_use]
    pub fn volume_count(&self) -> usize {
        self.lock().volumes.len()
    }

    /// Raw volume as stored, if present.
    #[must_use]
    pub fn volume(&self, volume_id: &VolumeId) -> Option<RawVolume> {
        self.lock()
            .volumes
            .get(volume_id.as_str())
            .map(|volume| volume.raw.clone())
    }

    /// Keys of the mount points attached to a volume.
    #[must_use]
    pub fn mount_point_keys(&self, volume_id: &VolumeId) -> Vec<MountPointKey> {
        self.lock()
            .volumes
            .get(volume_id.as_str())
            .map(|volume| volume.mount_points.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn dispatch<T>(
        &self,
        operation: Operation,
        target: String,
        apply: impl FnOnce(&mut FakeState) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall {
            operation,
            target,
            at: Instant::now(),
        });
        match state.take_fault(operation) {
            Some(fault) if fault.applied => {
                apply(&mut *state)?;
                Err(GatewayError::new(operation, fault.kind, "scripted failure after apply"))
            }
            Some(fault) => Err(GatewayError::new(operation, fault.kind, "scripted failure")),
            None => apply(&mut *state),
        }
    }
}

fn raw_volume(name: String, spec: &VolumeSpec) -> RawVolume {
    RawVolume {
        volume_id: String::new(),
        volume_name: name,
        remark: spec.remark.clone().unwrap_or_default(),
        size: i64::try_from(spec.size_gb).unwrap_or(i64::MAX),
        used_size: 0,
        storage_type: spec.storage_class.as_wire().to_owned(),
        protocol_type: spec.protocol.as_wire().to_owned(),
        expired_time: 0,
        is_expired: String::from("No"),
        max_mount_point_num: 0,
        total_mount_point_num: 0,
        tag: spec.tag.clone(),
        volume_status: Some(String::from(STATUS_AVAILABLE)),
        create_time: 1_700_000_000,
    }
}

fn raw_mount_point(key: &MountPointKey, name: &str) -> RawMountPoint {
    RawMountPoint {
        mount_point_name: name.to_owned(),
        vpc_id: key.vpc_id.to_string(),
        subnet_id: key.subnet_id.to_string(),
        mount_point_ip: Some(String::from("10.0.0.10")),
        create_time: 1_700_000_000,
    }
}

fn count_as_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

impl Gateway for FakeGateway {
    fn create_volume<'a>(
        &'a self,
        request: &'a CreateVolumeRequest,
    ) -> GatewayFuture<'a, CreatedVolume> {
        let result = self.dispatch(Operation::CreateVolume, request.name.clone(), |state| {
            let mut spec = VolumeSpec::new(
                request.protocol,
                request.storage_class,
                request.size_gb,
            );
            spec.remark.clone_from(&request.remark);
            spec.tag.clone_from(&request.tag);
            let mut raw = raw_volume(request.name.clone(), &spec);
            let lag = state.readiness_lag;
            if lag > 0 {
                raw.volume_status = Some(String::from(STATUS_CREATING));
            }
            let visibility = state.visibility_lag;
            let volume_id = state.insert_volume(raw, lag, visibility);
            Ok(CreatedVolume {
                volume_id,
                name: request.name.clone(),
                status: Some(String::from(if lag > 0 {
                    STATUS_CREATING
                } else {
                    STATUS_AVAILABLE
                })),
            })
        });
        Box::pin(async move { result })
    }

    fn read_volumes<'a>(&'a self, query: &'a VolumeQuery) -> GatewayFuture<'a, VolumePage> {
        let target = query
            .volume_id
            .as_ref()
            .map_or_else(|| String::from("*"), ToString::to_string);
        let result = self.dispatch(Operation::ReadVolumes, target, |state| {
            let maximum = state.max_mount_points();
            let mut matching = Vec::new();
            for volume in state.volumes.values_mut() {
                if query
                    .volume_id
                    .as_ref()
                    .is_some_and(|id| id.as_str() != volume.raw.volume_id)
                {
                    continue;
                }
                if volume.reads_until_visible > 0 {
                    volume.reads_until_visible -= 1;
                    continue;
                }
                if volume.reads_until_ready > 0 {
                    volume.reads_until_ready -= 1;
                } else {
                    volume.raw.volume_status = Some(String::from(STATUS_AVAILABLE));
                }
                let mut raw = volume.raw.clone();
                raw.max_mount_point_num = i64::from(maximum);
                raw.total_mount_point_num = count_as_i64(volume.mount_points.len());
                matching.push(raw);
            }
            let total_count = state
                .total_count_override
                .unwrap_or_else(|| u64::try_from(matching.len()).unwrap_or(u64::MAX));
            let volumes = matching
                .into_iter()
                .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
                .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
                .collect();
            Ok(VolumePage {
                volumes,
                total_count,
            })
        });
        Box::pin(async move { result })
    }

    fn extend_volume<'a>(
        &'a self,
        volume_id: &'a VolumeId,
        size_gb: u64,
    ) -> GatewayFuture<'a, ()> {
        let operation = Operation::ExtendVolume;
        let result = self.dispatch(operation, format!("{volume_id}:{size_gb}"), |state| {
            let volume = state.volume_mut(operation, volume_id)?;
            let size = i64::try_from(size_gb).unwrap_or(i64::MAX);
            if size < volume.raw.size {
                return Err(GatewayError::new(
                    operation,
                    ErrorKind::Validation,
                    "volumes cannot shrink",
                ));
            }
            volume.raw.size = size;
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn update_volume_info<'a>(
        &'a self,
        request: &'a UpdateVolumeInfoRequest,
    ) -> GatewayFuture<'a, ()> {
        let operation = Operation::UpdateVolumeInfo;
        let result = self.dispatch(operation, request.volume_id.to_string(), |state| {
            let volume = state.volume_mut(operation, &request.volume_id)?;
            if let Some(name) = &request.name {
                volume.raw.volume_name.clone_from(name);
            }
            if let Some(remark) = &request.remark {
                volume.raw.remark.clone_from(remark);
            }
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn remove_volume<'a>(&'a self, volume_id: &'a VolumeId) -> GatewayFuture<'a, ()> {
        let operation = Operation::RemoveVolume;
        let result = self.dispatch(operation, volume_id.to_string(), |state| {
            let volume = state.volume_mut(operation, volume_id)?;
            if !volume.mount_points.is_empty() {
                return Err(GatewayError::new(
                    operation,
                    ErrorKind::Validation,
                    "mount points must be removed first",
                ));
            }
            state.volumes.remove(volume_id.as_str());
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn read_mount_points<'a>(
        &'a self,
        volume_id: &'a VolumeId,
    ) -> GatewayFuture<'a, MountPointPage> {
        let operation = Operation::ReadMountPoints;
        let result = self.dispatch(operation, volume_id.to_string(), |state| {
            let maximum = state.max_mount_points();
            let volume = state.volume_mut(operation, volume_id)?;
            Ok(MountPointPage {
                mount_points: volume.mount_points.values().cloned().collect(),
                max_mount_point_num: i64::from(maximum),
                total_mount_point_num: count_as_i64(volume.mount_points.len()),
            })
        });
        Box::pin(async move { result })
    }

    fn add_mount_point<'a>(&'a self, request: &'a MountPointRequest) -> GatewayFuture<'a, ()> {
        let operation = Operation::AddMountPoint;
        let result = self.dispatch(operation, request.key.to_string(), |state| {
            let maximum = state.max_mount_points();
            let volume = state.volume_mut(operation, &request.volume_id)?;
            if volume.mount_points.contains_key(&request.key) {
                return Err(GatewayError::new(
                    operation,
                    ErrorKind::Duplicate,
                    format!("mount point {} already exists", request.key),
                ));
            }
            if volume.mount_points.len() >= usize::try_from(maximum).unwrap_or(usize::MAX) {
                return Err(GatewayError::new(
                    operation,
                    ErrorKind::Quota,
                    "mount point limit reached",
                ));
            }
            volume.mount_points.insert(
                request.key.clone(),
                raw_mount_point(&request.key, &request.name),
            );
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn remove_mount_point<'a>(
        &'a self,
        volume_id: &'a VolumeId,
        key: &'a MountPointKey,
    ) -> GatewayFuture<'a, ()> {
        let operation = Operation::RemoveMountPoint;
        let result = self.dispatch(operation, key.to_string(), |state| {
            let volume = state.volume_mut(operation, volume_id)?;
            volume.mount_points.remove(key).map(|_| ()).ok_or_else(|| {
                GatewayError::new(
                    operation,
                    ErrorKind::NotFound,
                    format!("mount point {key} does not exist"),
                )
            })
        });
        Box::pin(async move { result })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets or removes environment variables while holding [`ENV_LOCK`].
    /// A `None` value removes the variable for the lifetime of the guard.
    pub async fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
