//! Mutation planning
//!
//! The planner binds a [`DesiredState`] to the host: it probes for the target,
//! captures the before-state once, and hands back a [`Mutation`] ready for the
//! executor. Protected targets never become mutations.

use crate::host::Host;
use crate::resource::{ResourceKind, ResourceTarget, Snapshot, normalize_identity};
use crate::rules::DesiredState;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Services the engine refuses to touch, whatever a tier or profile says
const PROTECTED_SERVICES: &[&str] = &[
    "AudioEndpointBuilder",
    "Audiosrv",
    "BFE",
    "BrokerInfrastructure",
    "CoreMessagingRegistrar",
    "CryptSvc",
    "DcomLaunch",
    "Dhcp",
    "Dnscache",
    "EventLog",
    "LSM",
    "mpssvc",
    "nsi",
    "PlugPlay",
    "Power",
    "ProfSvc",
    "RpcEptMapper",
    "RpcSs",
    "SamSs",
    "Schedule",
    "SystemEventsBroker",
    "Themes",
    "TrustedInstaller",
    "WinDefend",
    "Winmgmt",
];

/// Where a mutation is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Applied,
    SkippedNotFound,
    SkippedUserDeclined,
    Failed,
    /// Dry-run terminal state; reported, never counted as applied
    Previewed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Applied => "applied",
            Outcome::SkippedNotFound => "skipped (not found)",
            Outcome::SkippedUserDeclined => "skipped (declined)",
            Outcome::Failed => "failed",
            Outcome::Previewed => "previewed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Outcome::Pending
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A desired state bound to the host state captured before it runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub desired: DesiredState,
    /// Captured before any change; `None` when the target is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Snapshot>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl Mutation {
    /// A pending mutation with no captured state
    pub fn new(desired: DesiredState) -> Self {
        Self {
            desired,
            before: None,
            outcome: Outcome::Pending,
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn target(&self) -> &ResourceTarget {
        &self.desired.target
    }

    /// Whether the captured state already has the desired value
    pub fn is_noop(&self) -> bool {
        self.before
            .as_ref()
            .is_some_and(|before| before.satisfies(&self.desired.value))
    }

    /// Before value for logs
    pub fn before_display(&self) -> String {
        match &self.before {
            Some(snapshot) => snapshot.to_string(),
            None => "<absent>".to_string(),
        }
    }

    /// After value for logs: the desired value once applied or previewed,
    /// otherwise the unchanged before value
    pub fn after_display(&self) -> String {
        match self.outcome {
            Outcome::Applied | Outcome::Previewed => self.desired.value.to_string(),
            _ => self.before_display(),
        }
    }

    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        self.outcome = Outcome::Failed;
        self.error = Some(reason.into());
    }
}

/// Turns desired states into mutations
#[derive(Debug, Clone)]
pub struct Planner {
    /// Service names protected by default
    services: HashSet<String>,
    /// Caller additions, matched against any kind
    extra: HashSet<String>,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    /// Planner protecting the built-in critical services
    pub fn new() -> Self {
        Self {
            services: PROTECTED_SERVICES
                .iter()
                .map(|s| normalize_identity(s))
                .collect(),
            extra: HashSet::new(),
        }
    }

    /// Planner with no protected targets
    pub fn unprotected() -> Self {
        Self {
            services: HashSet::new(),
            extra: HashSet::new(),
        }
    }

    /// Add identities that must never be mutated
    pub fn with_protected<I, S>(mut self, identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra
            .extend(identities.into_iter().map(|s| normalize_identity(s.as_ref())));
        self
    }

    /// Whether the target is excluded from planning
    pub fn is_protected(&self, target: &ResourceTarget) -> bool {
        let normalized = target.normalized();
        self.extra.contains(&normalized)
            || (target.kind == ResourceKind::Service && self.services.contains(&normalized))
    }

    /// Probe the target and capture its before-state
    ///
    /// The result is `Pending` when the target exists, `SkippedNotFound` when
    /// it does not, and `Failed` when the host could not be read.
    pub fn plan_one(&self, host: &dyn Host, desired: &DesiredState) -> Mutation {
        let mut mutation = Mutation::new(desired.clone());
        let adapter = desired.target.kind.adapter();

        match adapter.probe(host, &desired.target) {
            Ok(true) => {}
            Ok(false) => {
                mutation.outcome = Outcome::SkippedNotFound;
                return mutation;
            }
            Err(e) => {
                mutation.fail(format!("probe failed: {}", e));
                return mutation;
            }
        }

        match adapter.snapshot(host, &desired.target) {
            Ok(Some(before)) => mutation.before = Some(before),
            Ok(None) => mutation.outcome = Outcome::SkippedNotFound,
            Err(e) => mutation.fail(format!("snapshot failed: {}", e)),
        }
        mutation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::resource::{DesiredValue, StartMode};
    use crate::rules::{Level, Origin};

    fn disable(name: &str) -> DesiredState {
        DesiredState::new(
            ResourceTarget::service(name),
            DesiredValue::StartMode(StartMode::Disabled),
            "test",
            Origin::Tier(Level::Light),
        )
    }

    #[test]
    fn present_target_captures_before_state() {
        let mut host = MemoryHost::new();
        host.add_service("Telemetry-X", StartMode::Automatic);

        let mutation = Planner::new().plan_one(&host, &disable("Telemetry-X"));
        assert_eq!(mutation.outcome, Outcome::Pending);
        assert_eq!(
            mutation.before,
            Some(Snapshot::Service {
                mode: StartMode::Automatic
            })
        );
        assert!(!mutation.is_noop());
    }

    #[test]
    fn absent_target_is_skipped_not_found() {
        let host = MemoryHost::new();
        let mutation = Planner::new().plan_one(&host, &disable("Telemetry-X"));
        assert_eq!(mutation.outcome, Outcome::SkippedNotFound);
        assert_eq!(mutation.before, None);
        assert_eq!(mutation.error, None);
    }

    #[test]
    fn already_desired_state_is_a_noop() {
        let mut host = MemoryHost::new();
        host.add_service("Telemetry-X", StartMode::Disabled);
        let mutation = Planner::new().plan_one(&host, &disable("Telemetry-X"));
        assert!(mutation.is_noop());
    }

    #[test]
    fn critical_services_are_protected() {
        let planner = Planner::new();
        assert!(planner.is_protected(&ResourceTarget::service("rpcss")));
        assert!(!planner.is_protected(&ResourceTarget::startup("RpcSs")));
        assert!(!planner.is_protected(&ResourceTarget::service("DiagTrack")));
    }

    #[test]
    fn caller_protection_applies_to_any_kind() {
        let planner = Planner::unprotected().with_protected(["OneDrive"]);
        assert!(planner.is_protected(&ResourceTarget::startup("onedrive")));
        assert!(!planner.is_protected(&ResourceTarget::service("RpcSs")));
    }

    #[test]
    fn after_value_follows_outcome() {
        let mut mutation = Mutation::new(disable("Telemetry-X"));
        mutation.before = Some(Snapshot::Service {
            mode: StartMode::Automatic,
        });
        assert_eq!(mutation.after_display(), "automatic");
        mutation.outcome = Outcome::Applied;
        assert_eq!(mutation.after_display(), "disabled");
    }
}
