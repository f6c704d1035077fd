//! Integration tests for the study configuration manager: the lock
//! protocol, the cached reads, and batch-operation admission end to end.

use std::sync::Arc;
use std::time::Duration;

use genocat_core::config::LockConfig;
use genocat_core::error::ErrorKind;
use genocat_core::traits::MetadataAdaptor;
use genocat_core::types::id::{FileId, StudyId};
use genocat_core::types::study::{BatchKind, BatchStatus, StudyConfiguration};
use genocat_database::MemoryMetadataAdaptor;
use genocat_metadata::{add_batch_operation, ReadOptions, StudyConfigurationManager};

const STUDY: StudyId = StudyId(1);

async fn manager(lock: LockConfig) -> (Arc<MemoryMetadataAdaptor>, StudyConfigurationManager) {
    let adaptor = Arc::new(MemoryMetadataAdaptor::new(0));
    let mut config = StudyConfiguration::new(STUDY, "platinum");
    config.timestamp = 1;
    adaptor.update_study_configuration(&config).await.unwrap();
    let manager = StudyConfigurationManager::new(adaptor.clone(), lock);
    (adaptor, manager)
}

fn short_lock() -> LockConfig {
    LockConfig {
        duration_ms: 1_000,
        timeout_ms: 200,
    }
}

fn files(ids: &[i64]) -> Vec<FileId> {
    ids.iter().map(|id| FileId::new(*id)).collect()
}

#[tokio::test]
async fn test_lock_is_exclusive_until_released() {
    let (_, manager) = manager(short_lock()).await;

    let token = manager.lock_study(STUDY).await.unwrap();
    let err = manager.lock_study(STUDY).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);

    manager.unlock_study(STUDY, token).await.unwrap();
    let token = manager.lock_study(STUDY).await.unwrap();
    manager.unlock_study(STUDY, token).await.unwrap();
}

#[tokio::test]
async fn test_expired_lock_can_be_taken_over() {
    let (_, manager) = manager(LockConfig {
        duration_ms: 500,
        timeout_ms: 200,
    })
    .await;

    let stale = manager.lock_study(STUDY).await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    // The previous hold expired, so acquisition succeeds within the
    // timeout, and the stale release is silently ignored.
    let fresh = manager.lock_study(STUDY).await.unwrap();
    manager.unlock_study(STUDY, stale).await.unwrap();
    let err = manager.lock_study(STUDY).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    manager.unlock_study(STUDY, fresh).await.unwrap();
}

#[tokio::test]
async fn test_reads_are_defensive_copies() {
    let (_, manager) = manager(short_lock()).await;

    let mut copy = manager
        .get(STUDY, ReadOptions::fresh())
        .await
        .unwrap()
        .unwrap();
    copy.sample_ids
        .insert("NA12877".to_string(), genocat_core::types::id::SampleId::new(1));

    let again = manager
        .get(STUDY, ReadOptions::cached())
        .await
        .unwrap()
        .unwrap();
    assert!(again.sample_ids.is_empty());
}

#[tokio::test]
async fn test_cached_read_skips_the_adaptor_after_population() {
    let (adaptor, manager) = manager(short_lock()).await;

    assert!(manager
        .get(STUDY, ReadOptions::cached())
        .await
        .unwrap()
        .is_none());
    manager.get(STUDY, ReadOptions::fresh()).await.unwrap().unwrap();

    // A write bypassing the manager is invisible to cached reads but
    // visible to fresh ones.
    let mut config = StudyConfiguration::new(STUDY, "platinum");
    config.timestamp = 99;
    config
        .cohort_ids
        .insert("ALL".to_string(), genocat_core::types::id::CohortId::new(7));
    adaptor.update_study_configuration(&config).await.unwrap();

    let cached = manager
        .get(STUDY, ReadOptions::cached())
        .await
        .unwrap()
        .unwrap();
    assert!(cached.cohort_ids.is_empty());

    let fresh = manager
        .get(STUDY, ReadOptions::fresh())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.cohort_ids.len(), 1);
}

#[tokio::test]
async fn test_lock_and_update_persists_with_monotonic_timestamp() {
    let (adaptor, manager) = manager(short_lock()).await;

    let before = manager
        .get(STUDY, ReadOptions::fresh())
        .await
        .unwrap()
        .unwrap()
        .timestamp;
    let updated = manager
        .lock_and_update(STUDY, |mut config| {
            config
                .file_ids
                .insert("chr20.vcf.gz".to_string(), FileId::new(10));
            Ok(config)
        })
        .await
        .unwrap();
    assert!(updated.timestamp > before);

    let stored = adaptor
        .study_configuration_by_id(STUDY.get(), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.file_ids.len(), 1);

    // The lock was released on the way out.
    let token = manager.lock_study(STUDY).await.unwrap();
    manager.unlock_study(STUDY, token).await.unwrap();
}

#[tokio::test]
async fn test_failed_update_releases_the_lock_and_persists_nothing() {
    let (adaptor, manager) = manager(short_lock()).await;

    let err = manager
        .lock_and_update(STUDY, |mut config| {
            config.file_ids.insert("x.vcf".to_string(), FileId::new(1));
            Err(genocat_core::error::CatalogError::precondition("nope"))
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Precondition);

    let stored = adaptor
        .study_configuration_by_id(STUDY.get(), None)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.file_ids.is_empty());

    let token = manager.lock_study(STUDY).await.unwrap();
    manager.unlock_study(STUDY, token).await.unwrap();
}

#[tokio::test]
async fn test_batch_operation_admission_end_to_end() {
    let (_, manager) = manager(short_lock()).await;

    // Admit a load of [f1, f2] named "load": RUNNING.
    let updated = manager
        .lock_and_update(STUDY, |mut config| {
            add_batch_operation(
                &mut config,
                "load",
                &files(&[1, 2]),
                false,
                BatchKind::Load,
                |_| false,
            )?;
            Ok(config)
        })
        .await
        .unwrap();
    assert_eq!(updated.batches.len(), 1);
    assert_eq!(updated.batches[0].current_status(), BatchStatus::Running);

    // A concurrent identical submission is rejected and nothing persists.
    let err = manager
        .lock_and_update(STUDY, |mut config| {
            add_batch_operation(
                &mut config,
                "load",
                &files(&[1, 2]),
                false,
                BatchKind::Load,
                |_| false,
            )?;
            Ok(config)
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    // The first run fails; resuming re-enters RUNNING on the same record.
    let previous = manager
        .atomic_set_status(STUDY, BatchStatus::Error, "load", &files(&[1, 2]))
        .await
        .unwrap();
    assert_eq!(previous, BatchStatus::Running);

    let updated = manager
        .lock_and_update(STUDY, |mut config| {
            add_batch_operation(
                &mut config,
                "load",
                &files(&[1, 2]),
                true,
                BatchKind::Load,
                |_| false,
            )?;
            Ok(config)
        })
        .await
        .unwrap();
    assert_eq!(updated.batches.len(), 1);
    assert_eq!(updated.batches[0].current_status(), BatchStatus::Running);
    assert_eq!(updated.batches[0].status.len(), 3);
}

#[tokio::test]
async fn test_concurrent_compatible_operation_is_admitted() {
    let (_, manager) = manager(short_lock()).await;

    manager
        .lock_and_update(STUDY, |mut config| {
            add_batch_operation(
                &mut config,
                "load",
                &files(&[1]),
                false,
                BatchKind::Load,
                |_| false,
            )?;
            Ok(config)
        })
        .await
        .unwrap();

    // Annotation may run while the load is in flight; indexing may not.
    let updated = manager
        .lock_and_update(STUDY, |mut config| {
            add_batch_operation(
                &mut config,
                "annotate",
                &files(&[1]),
                false,
                BatchKind::Other,
                |op| op.kind == BatchKind::Load,
            )?;
            Ok(config)
        })
        .await
        .unwrap();
    assert_eq!(updated.batches.len(), 2);

    let err = manager
        .lock_and_update(STUDY, |mut config| {
            add_batch_operation(
                &mut config,
                "index",
                &files(&[2]),
                false,
                BatchKind::Load,
                |_| false,
            )?;
            Ok(config)
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[tokio::test]
async fn test_get_by_name_resolves_numeric_names_as_ids() {
    let (_, manager) = manager(short_lock()).await;

    let by_name = manager
        .get_by_name("platinum", ReadOptions::fresh())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_name.study_id, STUDY);

    let by_id = manager
        .get_by_name("1", ReadOptions::fresh())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_id.study_name, "platinum");
}
