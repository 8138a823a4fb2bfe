mod common;

use common::{Harness, keys};
use warden_command::{AddUserGrant, CommandConfig, PreconditionStrategy};
use warden_core::Error;

fn grant_request(id: &str, user_id: &str, project_grant_id: Option<&str>, roles: &[&str]) -> AddUserGrant {
    AddUserGrant {
        user_grant_id: Some(id.to_string()),
        user_id: user_id.to_string(),
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
async fn both_precondition_strategies_accept_a_valid_grant() {
    for h in strategies() {
        h.granted_project().await;
        h.user("o2", "u1", "ada").await;

        let details = h
            .commands
            .add_user_grant(&h.ctx, "o2", grant_request("ug1", "u1", Some("g1"), &["A"]))
            .await
            .unwrap();
        assert_eq!(details.resource_owner, "o2");
        assert_eq!(details.id.as_deref(), Some("ug1"));
    }
}

#[tokio::test]
async fn both_strategies_reject_roles_outside_the_project_grant() {
    for h in strategies() {
        h.granted_project().await;
        h.user("o2", "u1", "ada").await;

        // C exists on the project but was not granted to o2.
        let err = h
            .commands
            .add_user_grant(&h.ctx, "o2", grant_request("ug1", "u1", Some("g1"), &["C"]))
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed(), "{err:?}");
    }
}

#[tokio::test]
async fn both_strategies_require_a_grant_for_foreign_projects() {
    for h in strategies() {
        h.granted_project().await;
        h.user("o2", "u1", "ada").await;

        let err = h
            .commands
            .add_user_grant(&h.ctx, "o2", grant_request("ug1", "u1", None, &["A"]))
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed(), "{err:?}");
    }
}

#[tokio::test]
async fn both_strategies_reject_missing_users_and_inactive_projects() {
    for h in strategies() {
        h.granted_project().await;

        let missing_user = h
            .commands
            .add_user_grant(&h.ctx, "o1", grant_request("ug1", "nobody", None, &["A"]))
            .await
            .unwrap_err();
        assert!(missing_user.is_precondition_failed(), "{missing_user:?}");

        h.user("o1", "u1", "ada").await;
        h.commands.deactivate_project(&h.ctx, "p1", "o1").await.unwrap();
        let inactive = h
            .commands
            .add_user_grant(&h.ctx, "o1", grant_request("ug1", "u1", None, &["A"]))
            .await
            .unwrap_err();
        assert!(inactive.is_precondition_failed(), "{inactive:?}");
    }
}

#[tokio::test]
async fn change_is_strict_and_state_transitions_are_enforced() {
    let h = Harness::new();
    h.granted_project().await;
    h.user("o1", "u1", "ada").await;
    h.user_grant("o1", "ug1", "u1", "p1", None, &["A", "B"]).await;

    let unchanged = h
        .commands
        .change_user_grant(&h.ctx, "ug1", &keys(&["B", "A"]))
        .await
        .unwrap_err();
    assert!(unchanged.is_precondition_failed());

    h.commands.change_user_grant(&h.ctx, "ug1", &keys(&["C"])).await.unwrap();

    let not_inactive = h.commands.reactivate_user_grant(&h.ctx, "ug1").await.unwrap_err();
    assert!(not_inactive.is_precondition_failed());
    h.commands.deactivate_user_grant(&h.ctx, "ug1").await.unwrap();
    let not_active = h.commands.deactivate_user_grant(&h.ctx, "ug1").await.unwrap_err();
    assert!(not_active.is_precondition_failed());
    h.commands.reactivate_user_grant(&h.ctx, "ug1").await.unwrap();

    h.commands.remove_user_grant(&h.ctx, "ug1").await.unwrap();
    let gone = h.commands.remove_user_grant(&h.ctx, "ug1").await.unwrap_err();
    assert!(gone.is_not_found(), "{gone:?}");
}

#[tokio::test]
async fn duplicate_user_grants_hit_the_unique_constraint() {
    let h = Harness::new();
    h.granted_project().await;
    h.user("o1", "u1", "ada").await;
    h.user_grant("o1", "ug1", "u1", "p1", None, &["A"]).await;

    let err = h
        .commands
        .add_user_grant(&h.ctx, "o1", grant_request("ug2", "u1", None, &["B"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)), "{err:?}");
}

#[tokio::test]
async fn bulk_removal_is_all_or_nothing() {
    let h = Harness::new();
    h.granted_project().await;
    h.user("o1", "u1", "ada").await;
    h.user("o1", "u2", "grace").await;
    h.user_grant("o1", "ug1", "u1", "p1", None, &["A"]).await;
    h.user_grant("o1", "ug2", "u2", "p1", None, &["A"]).await;
    let before = h.event_count();

    let err = h
        .commands
        .bulk_remove_user_grants(&h.ctx, &keys(&["ug1", "missing"]))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
    assert_eq!(h.event_count(), before);

    let details = h
        .commands
        .bulk_remove_user_grants(&h.ctx, &keys(&["ug1", "ug2"]))
        .await
        .unwrap();
    let removed = h.events_since(before);
    let types: Vec<&str> = removed.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["user.grant.removed", "user.grant.removed"]);
    let last = removed.last().unwrap();
    assert_eq!(last.aggregate_id, "ug2");
    assert_eq!(details.resource_owner, "o1");
    assert_eq!(details.sequence, last.sequence);
    assert_eq!(details.change_date, Some(last.created_at));

    let empty = h.commands.bulk_remove_user_grants(&h.ctx, &[]).await.unwrap_err();
    assert!(matches!(empty, Error::InvalidArgument(_)), "{empty:?}");
}

#[tokio::test]
async fn removing_a_role_narrows_dependent_grants() {
    let h = Harness::new();
    h.granted_project().await;
    h.user("o1", "u1", "ada").await;
    h.user("o2", "u2", "grace").await;
    h.user_grant("o1", "ug1", "u1", "p1", None, &["A", "B"]).await;
    h.user_grant("o2", "ug2", "u2", "p1", Some("g1"), &["B"]).await;
    let before = h.event_count();

    h.commands
        .remove_project_role(&h.ctx, "p1", "o1", "B", &keys(&["ug1", "ug2"]), &[])
        .await
        .unwrap();

    let types: Vec<String> = h.events_since(before).into_iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            "project.role.removed",
            "project.grant.cascade.changed",
            "user.grant.cascade.changed",
            "user.grant.cascade.changed",
        ]
    );

    // B is gone from the project grant as well.
    let err = h
        .commands
        .add_user_grant(&h.ctx, "o2", grant_request("ug3", "u2", Some("g1"), &["B"]))
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());
}
