//! Property tests for rule set assembly

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use winopt_core::rules::{TierTable, assemble_with};
use winopt_core::{
    DesiredState, DesiredValue, Level, Origin, Profile, ProfileEntry, ResourceTarget, StartMode,
};

fn mode() -> impl Strategy<Value = StartMode> {
    prop_oneof![
        Just(StartMode::Automatic),
        Just(StartMode::AutomaticDelayed),
        Just(StartMode::Manual),
        Just(StartMode::Disabled),
    ]
}

fn level() -> impl Strategy<Value = Level> {
    prop_oneof![Just(Level::Light), Just(Level::Moderate), Just(Level::Aggressive)]
}

/// Short names so that case-insensitive collisions happen often
fn name() -> impl Strategy<Value = String> {
    "[A-Ca-c]{1,3}"
}

fn tiers_from(rules: &[(String, StartMode, Level)]) -> TierTable {
    rules.iter().fold(TierTable::new(), |table, (name, mode, level)| {
        table.with(
            *level,
            DesiredState::new(
                ResourceTarget::service(name.as_str()),
                DesiredValue::StartMode(*mode),
                "generated",
                Origin::Tier(*level),
            ),
        )
    })
}

fn profile_from(keep: &[String], add: &[(String, StartMode)]) -> Profile {
    let profile = keep
        .iter()
        .fold(Profile::new("generated"), |p, k| p.with_keep(k.clone()));
    add.iter().fold(profile, |p, (name, mode)| {
        p.with_add(ProfileEntry {
            kind: Some("service".to_string()),
            identity: name.clone(),
            value: toml::Value::String(mode.as_str().to_string()),
            value_type: None,
            justification: None,
        })
    })
}

proptest! {
    #[test]
    fn assembly_is_deterministic(
        rules in prop::collection::vec((name(), mode(), level()), 0..12),
        keep in prop::collection::vec(name(), 0..4),
        add in prop::collection::vec((name(), mode()), 0..6),
        requested in level(),
    ) {
        let tiers = tiers_from(&rules);
        let profile = profile_from(&keep, &add);

        let first = assemble_with(&tiers, requested, Some(&profile));
        let second = assemble_with(&tiers, requested, Some(&profile));

        prop_assert_eq!(first, second);
    }

    #[test]
    fn kept_identities_never_appear(
        rules in prop::collection::vec((name(), mode(), level()), 0..12),
        keep in prop::collection::vec(name(), 0..4),
        add in prop::collection::vec((name(), mode()), 0..6),
        requested in level(),
    ) {
        let ruleset = assemble_with(&tiers_from(&rules), requested, Some(&profile_from(&keep, &add)));

        for kept in &keep {
            prop_assert!(!ruleset.contains_identity(kept), "{} survived assembly", kept);
        }
    }

    #[test]
    fn overrides_appear_once_with_their_value(
        rules in prop::collection::vec((name(), mode(), level()), 0..12),
        keep in prop::collection::vec(name(), 0..4),
        add in prop::collection::vec((name(), mode()), 0..6),
        requested in level(),
    ) {
        let ruleset = assemble_with(&tiers_from(&rules), requested, Some(&profile_from(&keep, &add)));
        let kept: HashSet<String> = keep.iter().map(|k| k.to_lowercase()).collect();

        // last write wins among the overrides themselves
        let mut expected: HashMap<String, StartMode> = HashMap::new();
        for (name, mode) in &add {
            expected.insert(name.to_lowercase(), *mode);
        }

        for (name, mode) in expected.iter().filter(|(n, _)| !kept.contains(*n)) {
            let matches: Vec<&DesiredState> = ruleset
                .iter()
                .filter(|e| e.target.normalized() == *name)
                .collect();
            prop_assert_eq!(matches.len(), 1);
            prop_assert_eq!(&matches[0].value, &DesiredValue::StartMode(*mode));
        }
    }

    #[test]
    fn no_target_appears_twice(
        rules in prop::collection::vec((name(), mode(), level()), 0..12),
        add in prop::collection::vec((name(), mode()), 0..6),
        requested in level(),
    ) {
        let ruleset = assemble_with(&tiers_from(&rules), requested, Some(&profile_from(&[], &add)));

        let mut seen = HashSet::new();
        for entry in &ruleset {
            prop_assert!(seen.insert(entry.target.key()), "duplicate {}", entry.target);
        }
    }

    #[test]
    fn higher_levels_are_supersets(
        rules in prop::collection::vec((name(), mode(), level()), 0..12),
    ) {
        let tiers = tiers_from(&rules);
        let light = assemble_with(&tiers, Level::Light, None);
        let moderate = assemble_with(&tiers, Level::Moderate, None);
        let aggressive = assemble_with(&tiers, Level::Aggressive, None);

        for entry in &light {
            prop_assert!(moderate.get(&entry.target).is_some());
        }
        for entry in &moderate {
            prop_assert!(aggressive.get(&entry.target).is_some());
        }
    }
}
