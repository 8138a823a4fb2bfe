mod common;

use common::{Harness, keys};
use warden_command::{AddProject, AddProjectRole, ProjectChanges};
use warden_core::Error;

fn project(name: &str, roles: &[&str]) -> AddProject {
    AddProject {
        project_id: None,
        name: name.to_string(),
        project_role_assertion: true,
        project_role_check: false,
        roles: roles.iter().map(|k| AddProjectRole::new(*k, format!("Role {k}"))).collect(),
    }
}

#[tokio::test]
async fn a_project_and_its_initial_roles_are_pushed_together() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    let before = h.event_count();

    let details = h.commands.add_project(&h.ctx, "o1", project("Portal", &["admin", "viewer"])).await.unwrap();

    let types: Vec<String> = h.events_since(before).into_iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec!["project.added", "project.role.added", "project.role.added"]);
    assert_eq!(details.sequence, 3);
    assert_eq!(details.resource_owner, "o1");
    assert!(details.id.is_some());
}

#[tokio::test]
async fn project_names_are_unique_within_an_org() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.org("o2", "Globex").await;
    h.commands.add_project(&h.ctx, "o1", project("Portal", &[])).await.unwrap();

    let err = h.commands.add_project(&h.ctx, "o1", project("Portal", &[])).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)), "{err:?}");
    h.commands.add_project(&h.ctx, "o2", project("Portal", &[])).await.unwrap();
}

#[tokio::test]
async fn invalid_project_requests_are_rejected_early() {
    let h = Harness::new();

    let dup_roles = h.commands.add_project(&h.ctx, "o1", project("Portal", &["a", "a"])).await.unwrap_err();
    assert!(matches!(dup_roles, Error::InvalidArgument(_)), "{dup_roles:?}");
    let blank = h.commands.add_project(&h.ctx, "o1", project(" ", &[])).await.unwrap_err();
    assert!(matches!(blank, Error::InvalidArgument(_)), "{blank:?}");
    let no_org = h.commands.add_project(&h.ctx, "o1", project("Portal", &[])).await.unwrap_err();
    assert!(no_org.is_precondition_failed(), "{no_org:?}");
}

#[tokio::test]
async fn change_project_is_strict() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.project("o1", "p1", "Portal", &[]).await;

    let same = ProjectChanges {
        name: Some("Portal".into()),
        ..ProjectChanges::default()
    };
    let err = h.commands.change_project(&h.ctx, "p1", "o1", same).await.unwrap_err();
    assert!(err.is_precondition_failed());

    let renamed = ProjectChanges {
        name: Some("Console".into()),
        project_role_check: Some(true),
        ..ProjectChanges::default()
    };
    h.commands.change_project(&h.ctx, "p1", "o1", renamed).await.unwrap();

    let wrong_org = h
        .commands
        .change_project(&h.ctx, "p1", "o2", ProjectChanges::default())
        .await
        .unwrap_err();
    assert!(wrong_org.is_not_found());
}

#[tokio::test]
async fn project_state_machine() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.project("o1", "p1", "Portal", &[]).await;

    assert!(h.commands.reactivate_project(&h.ctx, "p1", "o1").await.unwrap_err().is_precondition_failed());
    h.commands.deactivate_project(&h.ctx, "p1", "o1").await.unwrap();
    assert!(h.commands.deactivate_project(&h.ctx, "p1", "o1").await.unwrap_err().is_precondition_failed());
    h.commands.reactivate_project(&h.ctx, "p1", "").await.unwrap();

    h.commands.remove_project(&h.ctx, "p1", "o1", &[]).await.unwrap();
    assert!(h.commands.deactivate_project(&h.ctx, "p1", "o1").await.unwrap_err().is_not_found());
    // The name is free again.
    h.project("o1", "p2", "Portal", &[]).await;
}

#[tokio::test]
async fn removing_a_project_cascades_only_to_its_own_user_grants() {
    let h = Harness::new();
    h.granted_project().await;
    h.project("o1", "p2", "Console", &["A"]).await;
    h.user("o1", "u1", "ada").await;
    h.user_grant("o1", "ug1", "u1", "p1", None, &["A"]).await;
    h.user_grant("o1", "ug2", "u1", "p2", None, &["A"]).await;
    let before = h.event_count();

    h.commands
        .remove_project(&h.ctx, "p1", "o1", &keys(&["ug1", "ug2"]))
        .await
        .unwrap();

    let appended = h.events_since(before);
    let types: Vec<&str> = appended.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["project.removed", "user.grant.cascade.removed"]);
    assert_eq!(appended[1].aggregate_id, "ug1");

    h.commands.change_user_grant(&h.ctx, "ug2", &keys(&[])).await.unwrap();
}

#[tokio::test]
async fn roles_are_added_in_bulk_and_changed_strictly() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.project("o1", "p1", "Portal", &["A"]).await;
    let before = h.event_count();

    h.commands
        .bulk_add_project_roles(
            &h.ctx,
            "p1",
            "o1",
            &[AddProjectRole::new("B", "Bee"), AddProjectRole::new("C", "Sea")],
        )
        .await
        .unwrap();
    assert_eq!(h.event_count(), before + 2);

    let existing = h
        .commands
        .add_project_role(&h.ctx, "p1", "o1", AddProjectRole::new("A", "Again"))
        .await
        .unwrap_err();
    assert!(matches!(existing, Error::AlreadyExists(_)), "{existing:?}");
    let empty = h.commands.bulk_add_project_roles(&h.ctx, "p1", "o1", &[]).await.unwrap_err();
    assert!(matches!(empty, Error::InvalidArgument(_)));

    let unchanged = h
        .commands
        .change_project_role(&h.ctx, "p1", "o1", AddProjectRole::new("B", "Bee"))
        .await
        .unwrap_err();
    assert!(unchanged.is_precondition_failed());
    h.commands
        .change_project_role(&h.ctx, "p1", "o1", AddProjectRole::new("B", "Bumblebee"))
        .await
        .unwrap();

    let missing = h
        .commands
        .remove_project_role(&h.ctx, "p1", "o1", "Z", &[], &[])
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}
