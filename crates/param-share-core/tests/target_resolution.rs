//! Target resolution against the in-memory organization.

mod common;

use std::collections::BTreeSet;

use common::*;
use param_share_core::memory::{MemoryCloud, MemoryOrganization};
use param_share_core::{AccountId, ShareError, TagMap, TargetResolver, TargetSet};
use proptest::prelude::*;

async fn resolve_with(
    cloud: &MemoryCloud,
    source: &str,
    tag_map: &TagMap,
) -> Result<TargetSet, ShareError> {
    TargetResolver::new(cloud, MANAGEMENT_ROLE)
        .resolve(&acct(source), tag_map)
        .await
}

fn ids(set: &TargetSet) -> Vec<&str> {
    set.iter().map(AccountId::as_str).collect()
}

#[tokio::test]
async fn direct_account_tag() {
    let cloud = MemoryCloud::new(organization());
    let targets = resolve_with(&cloud, "999999999999", &tags(&[("112233445566", "true")]))
        .await
        .unwrap();
    assert_eq!(ids(&targets), vec!["112233445566"]);
    // No hierarchy lookup needed.
    assert!(cloud.assumed_roles().await.is_empty());
}

#[tokio::test]
async fn direct_account_short_circuits_unit_and_root() {
    let cloud = MemoryCloud::new(organization());
    let tag_map = tags(&[
        ("r-abcd", "true"),
        (UNIT, "true"),
        ("112233445566", "true"),
    ]);
    let targets = resolve_with(&cloud, VAULT, &tag_map).await.unwrap();
    assert_eq!(ids(&targets), vec!["112233445566"]);
}

#[tokio::test]
async fn direct_account_short_circuits_even_an_invalid_unit() {
    let cloud = MemoryCloud::new(organization());
    let tag_map = tags(&[("ou-not-registered", "true"), ("112233445566", "true")]);
    let targets = resolve_with(&cloud, VAULT, &tag_map).await.unwrap();
    assert_eq!(ids(&targets), vec!["112233445566"]);
}

#[tokio::test]
async fn direct_account_equal_to_source_resolves_to_nothing() {
    let cloud = MemoryCloud::new(organization());
    let tag_map = tags(&[(VAULT, "true"), (UNIT, "true")]);
    let targets = resolve_with(&cloud, VAULT, &tag_map).await.unwrap();
    assert!(targets.is_empty());
}

#[tokio::test]
async fn disabled_direct_account_does_not_short_circuit() {
    let cloud = MemoryCloud::new(organization());
    let tag_map = tags(&[("112233445566", "false"), (OTHER_UNIT, "true")]);
    let targets = resolve_with(&cloud, VAULT, &tag_map).await.unwrap();
    assert_eq!(ids(&targets), vec!["222222222222", "444444444444"]);
}

#[tokio::test]
async fn root_expands_to_whole_organization_without_source() {
    let cloud = MemoryCloud::new(organization());
    let targets = resolve_with(&cloud, VAULT, &tags(&[("R-ABCD", "True")]))
        .await
        .unwrap();
    assert_eq!(
        ids(&targets),
        vec![
            "111111111111",
            "222222222222",
            "333333333333",
            "444444444444",
            "555555555555",
        ]
    );
}

#[tokio::test]
async fn units_union_and_deduplicate() {
    let cloud = MemoryCloud::new(organization());
    let tag_map = tags(&[(UNIT, "true"), (OTHER_UNIT, "TRUE")]);
    let targets = resolve_with(&cloud, VAULT, &tag_map).await.unwrap();
    assert_eq!(
        ids(&targets),
        vec!["111111111111", "222222222222", "333333333333", "444444444444"]
    );
}

#[tokio::test]
async fn nested_unit_alone() {
    let cloud = MemoryCloud::new(organization());
    let targets = resolve_with(&cloud, VAULT, &tags(&[(NESTED_UNIT, "true")]))
        .await
        .unwrap();
    assert_eq!(ids(&targets), vec!["333333333333"]);
}

#[tokio::test]
async fn invalid_unit_fails_resolution() {
    let cloud = MemoryCloud::new(organization());
    let err = resolve_with(&cloud, VAULT, &tags(&[(UNIT, "true"), ("ou-bogus", "true")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ShareError::InvalidOrganizationalUnit(unit) if unit == "ou-bogus"));
}

#[tokio::test]
async fn invalid_keys_and_values_resolve_to_nothing() {
    let cloud = MemoryCloud::new(organization());
    let tag_map = tags(&[("owner", "true"), ("12345", "true"), (UNIT, "yes")]);
    let targets = resolve_with(&cloud, VAULT, &tag_map).await.unwrap();
    assert!(targets.is_empty());
    assert!(cloud.assumed_roles().await.is_empty());
}

#[tokio::test]
async fn unreachable_management_role_is_fatal() {
    let cloud = MemoryCloud::new(organization());
    cloud.deny(&acct("000000000001")).await;
    let err = resolve_with(&cloud, VAULT, &tags(&[(UNIT, "true")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ShareError::Provider { .. }));
}

// Properties

const POOL: &[&str] = &[
    "999999999999",
    "111111111111",
    "222222222222",
    "333333333333",
    "444444444444",
    "555555555555",
    "112233445566",
];

fn org_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("r-abcd".to_string()),
        Just(UNIT.to_string()),
        Just(NESTED_UNIT.to_string()),
        Just(OTHER_UNIT.to_string()),
        "[a-z]{1,8}",
    ]
}

fn any_key() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(POOL).prop_map(str::to_string),
        org_key(),
    ]
}

fn flag_value() -> impl Strategy<Value = String> {
    prop::sample::select(&["true", "TRUE", "True", "false", "", "on"][..]).prop_map(str::to_string)
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn union_of_expansions(tag_map: &TagMap, source: &str) -> BTreeSet<String> {
    let org: Vec<(&str, Vec<&str>)> = vec![
        ("r-abcd", POOL[..6].to_vec()),
        (UNIT, vec!["111111111111", "222222222222", "999999999999", "333333333333"]),
        (NESTED_UNIT, vec!["333333333333"]),
        (OTHER_UNIT, vec!["444444444444", "222222222222"]),
    ];
    let mut expected = BTreeSet::new();
    for (key, value) in tag_map {
        if !value.eq_ignore_ascii_case("true") {
            continue;
        }
        if let Some((_, accounts)) = org.iter().find(|(k, _)| k == key) {
            expected.extend(accounts.iter().map(|a| a.to_string()));
        }
    }
    expected.remove(source);
    expected
}

proptest! {
    #[test]
    fn source_is_never_a_target(
        source in prop::sample::select(POOL),
        tag_map in prop::collection::btree_map(any_key(), flag_value(), 0..6),
    ) {
        let targets = block_on(async {
            let cloud = MemoryCloud::new(organization());
            resolve_with(&cloud, source, &tag_map).await
        })
        .unwrap();
        prop_assert!(!targets.contains(&acct(source)));
    }

    #[test]
    fn single_enabled_account_short_circuits(
        source in prop::sample::select(POOL),
        account in prop::sample::select(POOL),
        others in prop::collection::btree_map(org_key(), flag_value(), 0..5),
    ) {
        let mut tag_map = others;
        tag_map.insert(account.to_string(), "true".to_string());

        let targets = block_on(async {
            let cloud = MemoryCloud::new(organization());
            resolve_with(&cloud, source, &tag_map).await
        })
        .unwrap();

        let expected: Vec<&str> = if account == source { vec![] } else { vec![account] };
        prop_assert_eq!(ids(&targets), expected);
    }

    #[test]
    fn org_tags_resolve_to_union_minus_source(
        source in prop::sample::select(POOL),
        tag_map in prop::collection::btree_map(org_key(), flag_value(), 0..5),
    ) {
        let targets = block_on(async {
            let cloud = MemoryCloud::new(
                MemoryOrganization::new()
                    .with_page_size(1)
                    .with_unit(UNIT, [acct("111111111111"), acct("222222222222"), acct("999999999999")])
                    .with_child_unit(UNIT, NESTED_UNIT, [acct("333333333333")])
                    .with_unit(OTHER_UNIT, [acct("444444444444"), acct("222222222222")])
                    .with_account(acct("555555555555")),
            );
            resolve_with(&cloud, source, &tag_map).await
        })
        .unwrap();

        let got: BTreeSet<String> = targets.iter().map(|a| a.to_string()).collect();
        prop_assert_eq!(got, union_of_expansions(&tag_map, source));
    }
}
