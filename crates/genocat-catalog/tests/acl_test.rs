//! Integration tests for ACL mutation invariants.

mod helpers;

use genocat_catalog::acl::UpdateAclParams;
use genocat_core::error::ErrorKind;
use genocat_core::types::member::Member;
use genocat_entity::permission::{JobPermission, SamplePermission, StudyPermission};
use helpers::{TestCatalog, OWNER};

fn ana() -> Member {
    Member::User("ana".to_string())
}

#[tokio::test]
async fn test_set_then_get_round_trip() {
    let catalog = TestCatalog::new().await;
    let job_id = catalog.seed_job("align-1").await;
    catalog.memory.register_user("ana");
    catalog.grant_study_acl(ana(), &[]).await;

    catalog
        .mutator
        .create_entity_acls::<JobPermission>(OWNER, job_id, &[ana()], &["VIEW".to_string()])
        .await
        .unwrap();
    catalog
        .mutator
        .update_acl::<JobPermission>(
            OWNER,
            job_id,
            &ana(),
            UpdateAclParams {
                set: Some(vec!["UPDATE".to_string(), "DELETE".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let acl = catalog
        .mutator
        .get_acl::<JobPermission>(OWNER, job_id, &ana())
        .await
        .unwrap();
    assert_eq!(
        acl.first().unwrap().permissions,
        ["UPDATE".to_string(), "DELETE".to_string()].into()
    );
}

#[tokio::test]
async fn test_add_amends_the_permission_set() {
    let catalog = TestCatalog::new().await;
    let job_id = catalog.seed_job("align-1").await;
    catalog.memory.register_user("ana");
    catalog.grant_study_acl(ana(), &[]).await;

    catalog
        .mutator
        .create_entity_acls::<JobPermission>(OWNER, job_id, &[ana()], &["VIEW".to_string()])
        .await
        .unwrap();
    let acl = catalog
        .mutator
        .update_acl::<JobPermission>(
            OWNER,
            job_id,
            &ana(),
            UpdateAclParams {
                add: Some(vec!["DELETE".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let permissions = &acl.first().unwrap().permissions;
    assert_eq!(permissions.len(), 2);
    assert!(permissions.contains("VIEW"));
    assert!(permissions.contains("DELETE"));
}

#[tokio::test]
async fn test_entity_acl_requires_study_level_permissions_first() {
    let catalog = TestCatalog::new().await;
    let job_id = catalog.seed_job("align-1").await;
    catalog.memory.register_user("ana");

    // Invariant: no entity ACL without a study-level ACL for the member.
    let err = catalog
        .mutator
        .create_entity_acls::<JobPermission>(OWNER, job_id, &[ana()], &["VIEW".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Precondition);

    // The wildcard and anonymous members are exempt.
    catalog
        .mutator
        .create_entity_acls::<JobPermission>(
            OWNER,
            job_id,
            &[Member::Anyone],
            &["VIEW".to_string()],
        )
        .await
        .unwrap();

    // After a study-level grant the member qualifies.
    catalog.grant_study_acl(ana(), &[]).await;
    catalog
        .mutator
        .create_entity_acls::<JobPermission>(OWNER, job_id, &[ana()], &["VIEW".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_duplicate_acl_creation_is_rejected() {
    let catalog = TestCatalog::new().await;
    let job_id = catalog.seed_job("align-1").await;
    catalog.memory.register_user("ana");
    catalog.grant_study_acl(ana(), &[]).await;

    catalog
        .mutator
        .create_entity_acls::<JobPermission>(OWNER, job_id, &[ana()], &["VIEW".to_string()])
        .await
        .unwrap();
    let err = catalog
        .mutator
        .create_entity_acls::<JobPermission>(OWNER, job_id, &[ana()], &["DELETE".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Precondition);

    // At most one entry per member survived.
    let all = catalog
        .mutator
        .get_all_acls::<JobPermission>(OWNER, job_id)
        .await
        .unwrap();
    assert_eq!(all.result.len(), 1);
}

#[tokio::test]
async fn test_group_co_membership_counts_as_existing_acl() {
    let catalog = TestCatalog::new().await;
    let sample_id = catalog.seed_sample("NA12877").await;
    catalog.memory.register_user("ana");
    catalog
        .memory
        .seed_group(catalog.study_id.get(), "analysts", &["ana"]);
    catalog
        .grant_study_acl(Member::Group("analysts".to_string()), &[])
        .await;

    catalog
        .mutator
        .create_entity_acls::<SamplePermission>(
            OWNER,
            sample_id,
            &[Member::Group("analysts".to_string())],
            &["VIEW".to_string()],
        )
        .await
        .unwrap();

    // ana resolves through the group, so a direct entry would overlap.
    let err = catalog
        .mutator
        .create_entity_acls::<SamplePermission>(
            OWNER,
            sample_id,
            &[ana()],
            &["VIEW".to_string()],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Precondition);
}

#[tokio::test]
async fn test_remove_twice_fails_without_changing_state() {
    let catalog = TestCatalog::new().await;
    let job_id = catalog.seed_job("align-1").await;
    catalog.memory.register_user("ana");
    catalog.grant_study_acl(ana(), &[]).await;
    catalog
        .mutator
        .create_entity_acls::<JobPermission>(OWNER, job_id, &[ana()], &["VIEW".to_string()])
        .await
        .unwrap();

    catalog
        .mutator
        .remove_acl::<JobPermission>(OWNER, job_id, &ana())
        .await
        .unwrap();
    let err = catalog
        .mutator
        .remove_acl::<JobPermission>(OWNER, job_id, &ana())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let all = catalog
        .mutator
        .get_all_acls::<JobPermission>(OWNER, job_id)
        .await
        .unwrap();
    assert!(all.result.is_empty());
}

#[tokio::test]
async fn test_reset_does_not_require_an_existing_entry() {
    let catalog = TestCatalog::new().await;
    let job_id = catalog.seed_job("align-1").await;

    catalog
        .mutator
        .reset_acl::<JobPermission>(OWNER, job_id, &Member::Anyone)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_owner_study_acl_cannot_be_removed() {
    let catalog = TestCatalog::new().await;

    let err = catalog
        .mutator
        .remove_acl::<StudyPermission>(
            OWNER,
            catalog.study_id.get(),
            &Member::User(OWNER.to_string()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Precondition);
}

#[tokio::test]
async fn test_acl_inspection_is_share_gated_with_self_exception() {
    let catalog = TestCatalog::new().await;
    let job_id = catalog.seed_job("align-1").await;
    catalog.memory.register_user("ana");
    catalog.memory.register_user("ben");
    catalog.grant_study_acl(ana(), &["VIEW_JOBS"]).await;
    catalog
        .grant_study_acl(Member::User("ben".to_string()), &[])
        .await;

    // ana lacks SHARE but may inspect her own entry.
    catalog
        .mutator
        .get_acl::<JobPermission>("ana", job_id, &ana())
        .await
        .unwrap();

    // ... and nobody else's.
    let err = catalog
        .mutator
        .get_acl::<JobPermission>("ana", job_id, &Member::User("ben".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);

    let err = catalog
        .mutator
        .get_all_acls::<JobPermission>("ana", job_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_unknown_permission_names_are_rejected() {
    let catalog = TestCatalog::new().await;
    let job_id = catalog.seed_job("align-1").await;

    let err = catalog
        .mutator
        .create_entity_acls::<JobPermission>(
            OWNER,
            job_id,
            &[Member::Anyone],
            &["FLY".to_string()],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_unknown_member_is_rejected() {
    let catalog = TestCatalog::new().await;
    let job_id = catalog.seed_job("align-1").await;

    // The study-level precondition trips first on entity ACL creation.
    let err = catalog
        .mutator
        .create_entity_acls::<JobPermission>(
            OWNER,
            job_id,
            &[Member::User("ghost".to_string())],
            &["VIEW".to_string()],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Precondition);

    // Member existence itself is validated on inspection.
    let err = catalog
        .mutator
        .get_acl::<JobPermission>(OWNER, job_id, &Member::User("ghost".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_study_acl_templates() {
    let catalog = TestCatalog::new().await;
    catalog.memory.register_user("ana");

    catalog
        .mutator
        .create_study_acls(
            OWNER,
            catalog.study_id,
            &[ana()],
            &[],
            Some("analyst"),
        )
        .await
        .unwrap();

    let acl = catalog
        .mutator
        .get_acl::<StudyPermission>(OWNER, catalog.study_id.get(), &ana())
        .await
        .unwrap();
    let permissions = &acl.first().unwrap().permissions;
    assert!(permissions.contains("VIEW_JOBS"));
    assert!(permissions.contains("CREATE_FILES"));
    assert!(!permissions.contains("DELETE_FILES"));
    assert!(!permissions.contains("SHARE_STUDY"));
}
