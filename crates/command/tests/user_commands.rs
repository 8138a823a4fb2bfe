mod common;

use common::{Harness, human, keys};
use warden_command::{AddIdpLink, AddIdp, CommandConfig, ProfileChanges};
use warden_core::Error;

#[tokio::test]
async fn adding_a_user_hashes_the_password() {
    let h = Harness::new();
    h.org("o1", "Acme").await;

    let details = h.commands.add_human_user(&h.ctx, "o1", human("u1", "ada")).await.unwrap();
    assert_eq!(details.resource_owner, "o1");
    assert_eq!(details.id.as_deref(), Some("u1"));

    let added = h.store.events().pop().unwrap();
    assert_eq!(added.event_type, "user.human.added");
    assert_eq!(added.payload["email"], "ada@example.com");
    assert!(!added.payload.to_string().contains("correct horse"));
}

#[tokio::test]
async fn user_input_is_validated_before_any_io() {
    let h = Harness::new();

    let mut short = human("u1", "ada");
    short.password = Some("short".into());
    let err = h.commands.add_human_user(&h.ctx, "o1", short).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err:?}");

    let mut bad_email = human("u1", "ada");
    bad_email.email = "not-an-email".into();
    let err = h.commands.add_human_user(&h.ctx, "o1", bad_email).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err:?}");

    assert_eq!(h.event_count(), 0);
}

#[tokio::test]
async fn password_length_follows_configuration() {
    let h = Harness::with_config(CommandConfig {
        password_min_length: 4,
        ..CommandConfig::default()
    });
    h.org("o1", "Acme").await;

    let mut user = human("u1", "ada");
    user.password = Some("four".into());
    h.commands.add_human_user(&h.ctx, "o1", user).await.unwrap();
    let err = h.commands.set_password(&h.ctx, "u1", "o1", "abc").await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn users_need_an_active_org() {
    let h = Harness::new();
    let missing = h.commands.add_human_user(&h.ctx, "ghost", human("u1", "ada")).await.unwrap_err();
    assert!(missing.is_precondition_failed());

    h.org("o1", "Acme").await;
    h.commands.deactivate_org(&h.ctx, "o1").await.unwrap();
    let inactive = h.commands.add_human_user(&h.ctx, "o1", human("u1", "ada")).await.unwrap_err();
    assert!(inactive.is_precondition_failed());
}

#[tokio::test]
async fn usernames_are_unique_across_orgs() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.org("o2", "Globex").await;
    h.user("o1", "u1", "ada").await;

    let err = h.commands.add_human_user(&h.ctx, "o2", human("u2", "ada")).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)), "{err:?}");

    let again = h.commands.add_human_user(&h.ctx, "o1", human("u1", "other")).await.unwrap_err();
    assert!(matches!(again, Error::AlreadyExists(_)), "{again:?}");

    h.commands.change_username(&h.ctx, "u1", "o1", "lovelace").await.unwrap();
    h.user("o2", "u2", "ada").await;

    let unchanged = h.commands.change_username(&h.ctx, "u1", "", "lovelace").await.unwrap_err();
    assert!(unchanged.is_precondition_failed());
}

#[tokio::test]
async fn profile_changes_are_idempotent() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.user("o1", "u1", "ada").await;
    let before = h.event_count();

    let same = ProfileChanges {
        first_name: Some("Ada".into()),
        ..ProfileChanges::default()
    };
    h.commands.set_profile(&h.ctx, "u1", "o1", same).await.unwrap();
    assert_eq!(h.event_count(), before);

    let renamed = ProfileChanges {
        display_name: Some("Countess".into()),
        ..ProfileChanges::default()
    };
    h.commands.set_profile(&h.ctx, "u1", "o1", renamed.clone()).await.unwrap();
    h.commands.set_profile(&h.ctx, "u1", "o1", renamed).await.unwrap();
    assert_eq!(h.event_count(), before + 1);

    let blank = ProfileChanges {
        last_name: Some(" ".into()),
        ..ProfileChanges::default()
    };
    let err = h.commands.set_profile(&h.ctx, "u1", "o1", blank).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn user_state_machine() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.user("o1", "u1", "ada").await;

    assert!(h.commands.unlock_user(&h.ctx, "u1", "o1").await.unwrap_err().is_precondition_failed());
    assert!(h.commands.reactivate_user(&h.ctx, "u1", "o1").await.unwrap_err().is_precondition_failed());

    h.commands.lock_user(&h.ctx, "u1", "o1").await.unwrap();
    assert!(h.commands.lock_user(&h.ctx, "u1", "o1").await.unwrap_err().is_precondition_failed());
    h.commands.unlock_user(&h.ctx, "u1", "o1").await.unwrap();

    h.commands.deactivate_user(&h.ctx, "u1", "o1").await.unwrap();
    assert!(h.commands.deactivate_user(&h.ctx, "u1", "o1").await.unwrap_err().is_precondition_failed());
    // An inactive user only comes back through reactivation.
    let locked_inactive = h.commands.lock_user(&h.ctx, "u1", "o1").await.unwrap_err();
    assert!(locked_inactive.is_precondition_failed(), "{locked_inactive:?}");
    assert!(h.commands.unlock_user(&h.ctx, "u1", "o1").await.unwrap_err().is_precondition_failed());
    h.commands.reactivate_user(&h.ctx, "u1", "o1").await.unwrap();

    let wrong_org = h.commands.lock_user(&h.ctx, "u1", "o2").await.unwrap_err();
    assert!(wrong_org.is_not_found());
}

#[tokio::test]
async fn removing_a_user_releases_username_and_cascades_grants() {
    let h = Harness::new();
    h.granted_project().await;
    h.user("o1", "u1", "ada").await;
    h.user_grant("o1", "ug1", "u1", "p1", None, &["A"]).await;
    let before = h.event_count();

    h.commands.remove_user(&h.ctx, "u1", "o1", &keys(&["ug1"])).await.unwrap();
    let types: Vec<String> = h.events_since(before).into_iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec!["user.removed", "user.grant.cascade.removed"]);

    assert!(h.commands.lock_user(&h.ctx, "u1", "o1").await.unwrap_err().is_not_found());
    h.user("o1", "u2", "ada").await;
}

#[tokio::test]
async fn external_identities_are_linked_once() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.org("o2", "Globex").await;
    h.user("o1", "u1", "ada").await;
    h.user("o2", "u2", "grace").await;
    let idp_id = h
        .commands
        .add_org_idp(
            &h.ctx,
            "o1",
            AddIdp {
                name: "Google".into(),
                client_id: "client".into(),
                client_secret: "secret".into(),
                issuer: "https://accounts.example.com".into(),
                scopes: vec![],
            },
        )
        .await
        .unwrap()
        .id
        .unwrap();
    let link = AddIdpLink {
        idp_config_id: idp_id.clone(),
        external_user_id: "ext-1".into(),
        display_name: "ada".into(),
    };

    h.commands.add_user_idp_link(&h.ctx, "u1", "o1", link.clone()).await.unwrap();
    let twice = h.commands.add_user_idp_link(&h.ctx, "u1", "o1", link.clone()).await.unwrap_err();
    assert!(matches!(twice, Error::AlreadyExists(_)));

    // The IDP belongs to o1, not to u2's organization.
    let foreign = h.commands.add_user_idp_link(&h.ctx, "u2", "o2", link).await.unwrap_err();
    assert!(foreign.is_precondition_failed());

    h.commands.remove_user_idp_link(&h.ctx, "u1", &idp_id, "ext-1").await.unwrap();
    let gone = h.commands.remove_user_idp_link(&h.ctx, "u1", &idp_id, "ext-1").await.unwrap_err();
    assert!(gone.is_not_found());
}
