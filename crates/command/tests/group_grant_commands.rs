mod common;

use common::{Harness, keys};
use warden_command::{AddGroupGrant, CommandConfig, PreconditionStrategy};
use warden_core::Error;

fn grant_request(id: &str, group_id: &str, project_grant_id: Option<&str>, roles: &[&str]) -> AddGroupGrant {
    AddGroupGrant {
        group_grant_id: Some(id.to_string()),
        group_id: group_id.to_string(),
        project_id: "p1".to_string(),
        project_grant_id: project_grant_id.map(str::to_string),
        role_keys: keys(roles),
    }
}

fn strategies() -> [Harness; 2] {
    [
        Harness::new(),
        Harness::with_config(CommandConfig {
            precondition_strategy: PreconditionStrategy::Replay,
            ..CommandConfig::default()
        }),
    ]
}

#[tokio::test]
async fn groups_are_granted_only_inside_their_org() {
    for h in strategies() {
        h.granted_project().await;
        h.group("o2", "grp1", "Partners").await;

        let details = h
            .commands
            .add_group_grant(&h.ctx, "o2", grant_request("gg1", "grp1", Some("g1"), &["A"]))
            .await
            .unwrap();
        assert_eq!(details.resource_owner, "o2");
        assert_eq!(details.id.as_deref(), Some("gg1"));

        // grp1 belongs to o2, so o1 cannot grant it its own project roles.
        let foreign = h
            .commands
            .add_group_grant(&h.ctx, "o1", grant_request("gg2", "grp1", None, &["A"]))
            .await
            .unwrap_err();
        assert_eq!(foreign, Error::precondition("grantee does not exist"));

        let outside = h
            .commands
            .add_group_grant(&h.ctx, "o2", grant_request("gg3", "grp1", Some("g1"), &["C"]))
            .await
            .unwrap_err();
        assert!(outside.is_precondition_failed(), "{outside:?}");
    }
}

#[tokio::test]
async fn one_grant_per_group_and_project() {
    let h = Harness::new();
    h.granted_project().await;
    h.group("o1", "grp1", "Editors").await;
    h.commands
        .add_group_grant(&h.ctx, "o1", grant_request("gg1", "grp1", None, &["A"]))
        .await
        .unwrap();

    let twice = h
        .commands
        .add_group_grant(&h.ctx, "o1", grant_request("gg2", "grp1", None, &["B"]))
        .await
        .unwrap_err();
    assert!(matches!(twice, Error::AlreadyExists(_)), "{twice:?}");
}

#[tokio::test]
async fn group_grant_lifecycle() {
    let h = Harness::new();
    h.granted_project().await;
    h.group("o1", "grp1", "Editors").await;
    h.commands
        .add_group_grant(&h.ctx, "o1", grant_request("gg1", "grp1", None, &["A", "B"]))
        .await
        .unwrap();

    let unchanged = h
        .commands
        .change_group_grant(&h.ctx, "gg1", &keys(&["B", "A"]))
        .await
        .unwrap_err();
    assert!(unchanged.is_precondition_failed(), "{unchanged:?}");
    h.commands.change_group_grant(&h.ctx, "gg1", &keys(&["C"])).await.unwrap();

    assert!(h.commands.reactivate_group_grant(&h.ctx, "gg1").await.unwrap_err().is_precondition_failed());
    h.commands.deactivate_group_grant(&h.ctx, "gg1").await.unwrap();
    assert!(h.commands.deactivate_group_grant(&h.ctx, "gg1").await.unwrap_err().is_precondition_failed());
    h.commands.reactivate_group_grant(&h.ctx, "gg1").await.unwrap();

    h.commands.remove_group_grant(&h.ctx, "gg1").await.unwrap();
    assert!(h.commands.remove_group_grant(&h.ctx, "gg1").await.unwrap_err().is_not_found());

    // The uniqueness claim went with the removal.
    h.commands
        .add_group_grant(&h.ctx, "o1", grant_request("gg2", "grp1", None, &["A"]))
        .await
        .unwrap();
}

#[tokio::test]
async fn removing_a_role_narrows_group_grants_too() {
    let h = Harness::new();
    h.granted_project().await;
    h.user("o1", "u1", "ada").await;
    h.group("o1", "grp1", "Editors").await;
    h.group("o1", "grp2", "Readers").await;
    h.user_grant("o1", "ug1", "u1", "p1", None, &["A", "B"]).await;
    h.commands
        .add_group_grant(&h.ctx, "o1", grant_request("gg1", "grp1", None, &["A", "B"]))
        .await
        .unwrap();
    h.commands
        .add_group_grant(&h.ctx, "o1", grant_request("gg2", "grp2", None, &["A"]))
        .await
        .unwrap();
    let before = h.event_count();

    h.commands
        .remove_project_role(&h.ctx, "p1", "o1", "B", &keys(&["ug1"]), &keys(&["gg1", "gg2", "missing"]))
        .await
        .unwrap();

    let added = h.events_since(before);
    let types: Vec<&str> = added.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        types,
        vec![
            "project.role.removed",
            "project.grant.cascade.changed",
            "user.grant.cascade.changed",
            "group.grant.cascade.changed",
        ]
    );
    assert_eq!(added[3].aggregate_id, "gg1");
    assert_eq!(added[3].payload["role_keys"], serde_json::json!(["A"]));
}

#[tokio::test]
async fn removing_a_group_removes_its_grants() {
    let h = Harness::new();
    h.granted_project().await;
    h.group("o1", "grp1", "Editors").await;
    h.group("o1", "grp2", "Readers").await;
    h.commands
        .add_group_grant(&h.ctx, "o1", grant_request("gg1", "grp1", None, &["A"]))
        .await
        .unwrap();
    h.commands
        .add_group_grant(&h.ctx, "o1", grant_request("gg2", "grp2", None, &["A"]))
        .await
        .unwrap();
    let before = h.event_count();

    // gg2 belongs to another group and is left alone.
    h.commands
        .remove_group(&h.ctx, "grp1", "o1", &keys(&["gg1", "gg2"]))
        .await
        .unwrap();
    let types: Vec<String> = h.events_since(before).into_iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec!["group.removed", "group.grant.cascade.removed"]);

    assert!(h.commands.deactivate_group_grant(&h.ctx, "gg1").await.unwrap_err().is_not_found());
    h.commands.deactivate_group_grant(&h.ctx, "gg2").await.unwrap();
    h.group("o1", "grp3", "Editors").await;
}

#[tokio::test]
async fn bulk_group_grant_removal_reports_the_last_write() {
    let h = Harness::new();
    h.granted_project().await;
    h.group("o1", "grp1", "Editors").await;
    h.group("o1", "grp2", "Readers").await;
    h.commands
        .add_group_grant(&h.ctx, "o1", grant_request("gg1", "grp1", None, &["A"]))
        .await
        .unwrap();
    h.commands
        .add_group_grant(&h.ctx, "o1", grant_request("gg2", "grp2", None, &["A"]))
        .await
        .unwrap();
    let before = h.event_count();

    let err = h
        .commands
        .bulk_remove_group_grants(&h.ctx, &keys(&["gg1", "missing"]))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
    assert_eq!(h.event_count(), before);

    let details = h
        .commands
        .bulk_remove_group_grants(&h.ctx, &keys(&["gg1", "gg2"]))
        .await
        .unwrap();
    let removed = h.events_since(before);
    assert_eq!(removed.len(), 2);
    assert_eq!(details.sequence, removed[1].sequence);
    assert_eq!(details.resource_owner, "o1");

    let empty = h.commands.bulk_remove_group_grants(&h.ctx, &[]).await.unwrap_err();
    assert!(matches!(empty, Error::InvalidArgument(_)));
}
