mod common;

use common::Harness;
use warden_command::{AddIdp, AddIdpLink, AddJwtIdp, AddOrg, ChangeIdp, IdpLinkRef, LoginPolicy};
use warden_core::Error;

fn idp(name: &str) -> AddIdp {
    AddIdp {
        name: name.to_string(),
        client_id: "client".to_string(),
        client_secret: "s3cret".to_string(),
        issuer: "https://accounts.example.com".to_string(),
        scopes: vec!["openid".to_string()],
    }
}

#[tokio::test]
async fn add_org_with_domains_pushes_one_batch() {
    let h = Harness::new();
    let details = h
        .commands
        .add_org(
            &h.ctx,
            AddOrg {
                org_id: None,
                name: "Acme".into(),
                domains: vec!["Acme.COM".into(), "acme.io".into()],
            },
        )
        .await
        .unwrap();

    let id = details.id.clone().unwrap();
    assert_eq!(details.resource_owner, id);
    assert_eq!(details.sequence, 3);
    assert_eq!(h.event_types(), vec!["org.added", "org.domain.added", "org.domain.added"]);

    // Domains were lowercased on the way in.
    let err = h.commands.add_org_domain(&h.ctx, &id, "acme.com").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)), "{err:?}");
}

#[tokio::test]
async fn org_names_are_unique_per_instance() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.org("o2", "Globex").await;

    let err = h
        .commands
        .add_org(
            &h.ctx,
            AddOrg {
                org_id: None,
                name: "Acme".into(),
                domains: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)), "{err:?}");

    let err = h.commands.change_org(&h.ctx, "o2", "Acme").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)), "{err:?}");

    // Removal releases the name.
    h.commands.remove_org(&h.ctx, "o1").await.unwrap();
    h.commands.change_org(&h.ctx, "o2", "Acme").await.unwrap();
}

#[tokio::test]
async fn change_org_is_strict() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    let before = h.event_count();

    let err = h.commands.change_org(&h.ctx, "o1", " Acme ").await.unwrap_err();
    assert!(err.is_precondition_failed());
    assert_eq!(h.event_count(), before);

    let blank = h.commands.change_org(&h.ctx, "o1", "  ").await.unwrap_err();
    assert!(matches!(blank, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn org_state_machine() {
    let h = Harness::new();
    h.org("o1", "Acme").await;

    assert!(h.commands.reactivate_org(&h.ctx, "o1").await.unwrap_err().is_precondition_failed());
    h.commands.deactivate_org(&h.ctx, "o1").await.unwrap();
    assert!(h.commands.deactivate_org(&h.ctx, "o1").await.unwrap_err().is_precondition_failed());
    h.commands.reactivate_org(&h.ctx, "o1").await.unwrap();

    h.commands.remove_org(&h.ctx, "o1").await.unwrap();
    assert!(h.commands.remove_org(&h.ctx, "o1").await.unwrap_err().is_not_found());
    assert!(h.commands.change_org(&h.ctx, "o1", "Other").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn domain_lifecycle() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.org("o2", "Globex").await;
    h.commands.add_org_domain(&h.ctx, "o1", "acme.com").await.unwrap();
    h.commands.add_org_domain(&h.ctx, "o2", "acme.com").await.unwrap();

    let unverified = h.commands.set_primary_org_domain(&h.ctx, "o1", "acme.com").await.unwrap_err();
    assert!(unverified.is_precondition_failed());

    h.commands.verify_org_domain(&h.ctx, "o1", "acme.com", &[]).await.unwrap();
    let twice = h.commands.verify_org_domain(&h.ctx, "o1", "acme.com", &[]).await.unwrap_err();
    assert!(twice.is_precondition_failed());

    // A verified domain is reserved instance-wide.
    let taken = h.commands.verify_org_domain(&h.ctx, "o2", "acme.com", &[]).await.unwrap_err();
    assert!(matches!(taken, Error::AlreadyExists(_)), "{taken:?}");

    h.commands.set_primary_org_domain(&h.ctx, "o1", "acme.com").await.unwrap();
    let again = h.commands.set_primary_org_domain(&h.ctx, "o1", "acme.com").await.unwrap_err();
    assert!(again.is_precondition_failed());
    let primary = h.commands.remove_org_domain(&h.ctx, "o1", "acme.com").await.unwrap_err();
    assert!(primary.is_precondition_failed());

    let missing = h.commands.remove_org_domain(&h.ctx, "o1", "nope.com").await.unwrap_err();
    assert!(missing.is_not_found());
    h.commands.remove_org_domain(&h.ctx, "o2", "acme.com").await.unwrap();
}

#[tokio::test]
async fn idp_changes_use_set_semantics_and_encrypt_secrets() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    let idp_id = h.commands.add_org_idp(&h.ctx, "o1", idp("Google")).await.unwrap().id.unwrap();

    let added = h.store.events().pop().unwrap();
    assert_eq!(added.event_type, "org.idp.config.added");
    assert!(!added.payload.to_string().contains("s3cret"));

    let before = h.event_count();
    let same = ChangeIdp {
        name: Some("Google".into()),
        ..ChangeIdp::default()
    };
    h.commands.change_org_idp(&h.ctx, "o1", &idp_id, same).await.unwrap();
    assert_eq!(h.event_count(), before);

    let renamed = ChangeIdp {
        name: Some("Workspace".into()),
        ..ChangeIdp::default()
    };
    h.commands.change_org_idp(&h.ctx, "o1", &idp_id, renamed).await.unwrap();
    assert_eq!(h.event_count(), before + 1);

    let missing = h
        .commands
        .change_org_idp(&h.ctx, "o1", "unknown", ChangeIdp::default())
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn removing_an_idp_cascades_to_policy_and_links() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.user("o1", "u1", "ada").await;
    let idp_id = h.commands.add_org_idp(&h.ctx, "o1", idp("Google")).await.unwrap().id.unwrap();
    h.commands
        .add_login_policy(&h.ctx, "o1", LoginPolicy::default())
        .await
        .unwrap();
    h.commands.add_idp_to_login_policy(&h.ctx, "o1", &idp_id).await.unwrap();
    h.commands
        .add_user_idp_link(
            &h.ctx,
            "u1",
            "o1",
            AddIdpLink {
                idp_config_id: idp_id.clone(),
                external_user_id: "ext-1".into(),
                display_name: "ada@google".into(),
            },
        )
        .await
        .unwrap();
    let before = h.event_count();

    h.commands
        .remove_org_idp(
            &h.ctx,
            "o1",
            &idp_id,
            &[IdpLinkRef::new("u1", "ext-1"), IdpLinkRef::new("u1", "ext-unknown")],
        )
        .await
        .unwrap();

    let types: Vec<String> = h.events_since(before).into_iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            "org.idp.config.removed",
            "org.policy.login.idpprovider.cascade.removed",
            "user.human.externalidp.cascade.removed",
        ]
    );

    // The external identity is free again, but the IDP is gone.
    let err = h
        .commands
        .add_user_idp_link(
            &h.ctx,
            "u1",
            "o1",
            AddIdpLink {
                idp_config_id: idp_id,
                external_user_id: "ext-1".into(),
                display_name: String::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed(), "{err:?}");
}

#[tokio::test]
async fn instance_idps_serve_every_org_and_cascade_on_removal() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    h.org("o2", "Globex").await;
    h.user("o1", "u1", "ada").await;
    let idp_id = h
        .commands
        .add_instance_jwt_idp(
            &h.ctx,
            AddJwtIdp {
                name: "Gateway".into(),
                jwt_endpoint: "https://gw.example.com/jwt".into(),
                issuer: "https://gw.example.com".into(),
                keys_endpoint: "https://gw.example.com/keys".into(),
                header_name: "authorization".into(),
            },
        )
        .await
        .unwrap()
        .id
        .unwrap();
    let added = h.store.events().pop().unwrap();
    assert_eq!(added.event_type, "instance.idp.config.added");
    assert_eq!(added.aggregate_id, common::INSTANCE);
    assert_eq!(added.payload["config"]["type"], "jwt");

    let oidc_only = ChangeIdp {
        client_id: Some("client".into()),
        ..ChangeIdp::default()
    };
    let err = h.commands.change_instance_idp(&h.ctx, &idp_id, oidc_only).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err:?}");
    // Instance IDPs are not reachable through an organization.
    let via_org = h
        .commands
        .change_org_idp(&h.ctx, "o1", &idp_id, ChangeIdp::default())
        .await
        .unwrap_err();
    assert!(via_org.is_not_found());

    h.commands.add_login_policy(&h.ctx, "o1", LoginPolicy::default()).await.unwrap();
    h.commands.add_idp_to_login_policy(&h.ctx, "o1", &idp_id).await.unwrap();
    let linked = h.store.events().pop().unwrap();
    assert_eq!(linked.payload["idp_owner"], "system");
    h.commands
        .add_user_idp_link(
            &h.ctx,
            "u1",
            "o1",
            AddIdpLink {
                idp_config_id: idp_id.clone(),
                external_user_id: "ext-1".into(),
                display_name: "ada".into(),
            },
        )
        .await
        .unwrap();
    let before = h.event_count();

    // o2 has no login policy; its hint is skipped.
    h.commands
        .remove_instance_idp(
            &h.ctx,
            &idp_id,
            &["o1".to_string(), "o2".to_string()],
            &[IdpLinkRef::new("u1", "ext-1")],
        )
        .await
        .unwrap();
    let types: Vec<String> = h.events_since(before).into_iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            "instance.idp.config.removed",
            "org.policy.login.idpprovider.cascade.removed",
            "user.human.externalidp.cascade.removed",
        ]
    );

    let gone = h.commands.add_idp_to_login_policy(&h.ctx, "o1", &idp_id).await.unwrap_err();
    assert!(gone.is_precondition_failed());
}

#[tokio::test]
async fn login_policy_rules() {
    let h = Harness::new();
    h.org("o1", "Acme").await;
    let policy = LoginPolicy {
        allow_username_password: true,
        ..LoginPolicy::default()
    };

    let missing = h.commands.change_login_policy(&h.ctx, "o1", policy.clone()).await.unwrap_err();
    assert!(missing.is_not_found());
    let no_org = h.commands.add_login_policy(&h.ctx, "ghost", policy.clone()).await.unwrap_err();
    assert!(no_org.is_not_found());

    h.commands.add_login_policy(&h.ctx, "o1", policy.clone()).await.unwrap();
    let dup = h.commands.add_login_policy(&h.ctx, "o1", policy.clone()).await.unwrap_err();
    assert!(matches!(dup, Error::AlreadyExists(_)));

    let unchanged = h.commands.change_login_policy(&h.ctx, "o1", policy.clone()).await.unwrap_err();
    assert!(unchanged.is_precondition_failed());
    let stricter = LoginPolicy {
        force_mfa: true,
        ..policy
    };
    h.commands.change_login_policy(&h.ctx, "o1", stricter).await.unwrap();

    let unknown_idp = h.commands.add_idp_to_login_policy(&h.ctx, "o1", "nope").await.unwrap_err();
    assert!(unknown_idp.is_precondition_failed());
    let not_linked = h
        .commands
        .remove_idp_from_login_policy(&h.ctx, "o1", "nope", &[])
        .await
        .unwrap_err();
    assert!(not_linked.is_not_found());

    h.commands.remove_login_policy(&h.ctx, "o1").await.unwrap();
    assert!(h.commands.remove_login_policy(&h.ctx, "o1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn default_login_policy_lives_on_the_instance() {
    let h = Harness::new();
    let policy = LoginPolicy {
        allow_register: true,
        ..LoginPolicy::default()
    };

    let details = h.commands.add_default_login_policy(&h.ctx, policy.clone()).await.unwrap();
    assert_eq!(details.resource_owner, common::INSTANCE);
    let dup = h.commands.add_default_login_policy(&h.ctx, policy.clone()).await.unwrap_err();
    assert!(matches!(dup, Error::AlreadyExists(_)));
    let unchanged = h.commands.change_default_login_policy(&h.ctx, policy).await.unwrap_err();
    assert!(unchanged.is_precondition_failed());
}
