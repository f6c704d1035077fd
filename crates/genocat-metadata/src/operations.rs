//! The batch-operation admission state machine.
//!
//! Transitions: `READY → RUNNING → {DONE | ERROR}`, with `ERROR → RUNNING`
//! on resume. Admission serializes incompatible operations per study while
//! an `allow_concurrent` predicate lets compatible ones proceed in
//! parallel (e.g. concurrent annotation loading while variant indexing is
//! forbidden).

use chrono::Utc;

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::types::id::FileId;
use genocat_core::types::study::{BatchKind, BatchOperation, BatchStatus, StudyConfiguration};

/// The most recent operation matching `(name, files)`, scanning the
/// history newest-first.
pub fn get_operation<'a>(
    config: &'a StudyConfiguration,
    operation_name: &str,
    file_ids: &[FileId],
) -> Option<&'a BatchOperation> {
    config
        .batches
        .iter()
        .rev()
        .find(|op| op.operation_name == operation_name && op.file_ids == file_ids)
}

/// Append a status change to an existing operation, returning the previous
/// status.
pub fn set_status(
    config: &mut StudyConfiguration,
    status: BatchStatus,
    operation_name: &str,
    file_ids: &[FileId],
) -> CatalogResult<BatchStatus> {
    let operation = config
        .batches
        .iter_mut()
        .rev()
        .find(|op| op.operation_name == operation_name && op.file_ids == file_ids)
        .ok_or_else(|| {
            CatalogError::internal(format!(
                "Batch operation {operation_name} for files {file_ids:?} not found"
            ))
        })?;
    let previous = operation.current_status();
    operation.add_status(Utc::now(), status);
    Ok(previous)
}

fn current_operation_in_progress(operation: &BatchOperation) -> CatalogError {
    CatalogError::conflict(format!(
        "Operation \"{}\" for files {:?} is already {}",
        operation.operation_name,
        operation.file_ids,
        match operation.current_status() {
            BatchStatus::Done => "done",
            _ => "in progress",
        }
    ))
}

fn other_operation_in_progress(
    operation: &BatchOperation,
    requested_name: &str,
    requested_files: &[FileId],
) -> CatalogError {
    CatalogError::conflict(format!(
        "Cannot run \"{requested_name}\" for files {requested_files:?} while operation \"{}\" \
         on files {:?} is in status {:?}",
        operation.operation_name,
        operation.file_ids,
        operation.current_status()
    ))
}

/// Admit a new batch operation into the study configuration.
///
/// - A `RUNNING`/`DONE` record of the same `(name, files, type)` with
///   `resume=false` fails with `Conflict` (current operation in progress).
/// - Any other non-`READY` record is arbitrated by `allow_concurrent`;
///   when the predicate rejects it, admission fails with `Conflict`.
/// - An `ERROR` record of the same operation is reused (resume), as is a
///   `RUNNING`/`DONE` record when `resume=true`.
///
/// On success the admitted operation is in status `RUNNING` (a resumed
/// `DONE` record keeps its status) and a new record has been appended to
/// the history.
pub fn add_batch_operation<'a>(
    config: &'a mut StudyConfiguration,
    operation_name: &str,
    file_ids: &[FileId],
    resume: bool,
    kind: BatchKind,
    allow_concurrent: impl Fn(&BatchOperation) -> bool,
) -> CatalogResult<&'a mut BatchOperation> {
    let mut resume_index = None;

    for (index, operation) in config.batches.iter().enumerate() {
        let status = operation.current_status();
        match status {
            BatchStatus::Ready => continue,
            BatchStatus::Running | BatchStatus::Done if !resume => {
                if operation.same_operation(file_ids, kind, operation_name) {
                    return Err(current_operation_in_progress(operation));
                }
                if allow_concurrent(operation) {
                    continue;
                }
                return Err(other_operation_in_progress(
                    operation,
                    operation_name,
                    file_ids,
                ));
            }
            // Resuming: RUNNING/DONE with resume, or any ERROR record.
            BatchStatus::Running | BatchStatus::Done | BatchStatus::Error => {
                if !operation.same_operation(file_ids, kind, operation_name) {
                    if allow_concurrent(operation) {
                        continue;
                    }
                    return Err(other_operation_in_progress(
                        operation,
                        operation_name,
                        file_ids,
                    ));
                }
                tracing::info!(
                    operation = operation_name,
                    "Resuming batch operation after {:?}",
                    status
                );
                resume_index = Some(index);
            }
        }
    }

    let index = match resume_index {
        Some(index) => index,
        None => {
            config.batches.push(BatchOperation::new(
                operation_name,
                file_ids.to_vec(),
                Utc::now().timestamp_millis(),
                kind,
            ));
            config.batches.len() - 1
        }
    };
    let operation = &mut config.batches[index];

    if operation.current_status() != BatchStatus::Done {
        operation.add_status(Utc::now(), BatchStatus::Running);
    }
    Ok(operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use genocat_core::error::ErrorKind;
    use genocat_core::types::id::StudyId;

    fn config() -> StudyConfiguration {
        StudyConfiguration::new(StudyId::new(1), "platinum")
    }

    fn files(ids: &[i64]) -> Vec<FileId> {
        ids.iter().map(|id| FileId::new(*id)).collect()
    }

    const NO_CONCURRENCY: fn(&BatchOperation) -> bool = |_| false;

    #[test]
    fn test_new_operation_is_admitted_as_running() {
        let mut sc = config();
        let op = add_batch_operation(&mut sc, "load", &files(&[1, 2]), false, BatchKind::Load, NO_CONCURRENCY)
            .unwrap();
        assert_eq!(op.current_status(), BatchStatus::Running);
        assert_eq!(sc.batches.len(), 1);
    }

    #[test]
    fn test_same_running_operation_is_rejected() {
        let mut sc = config();
        add_batch_operation(&mut sc, "load", &files(&[1, 2]), false, BatchKind::Load, NO_CONCURRENCY)
            .unwrap();
        let err = add_batch_operation(&mut sc, "load", &files(&[1, 2]), false, BatchKind::Load, NO_CONCURRENCY)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[test]
    fn test_different_running_operation_is_arbitrated_by_predicate() {
        let mut sc = config();
        add_batch_operation(&mut sc, "load", &files(&[1]), false, BatchKind::Load, NO_CONCURRENCY)
            .unwrap();

        let err =
            add_batch_operation(&mut sc, "annotate", &files(&[2]), false, BatchKind::Other, NO_CONCURRENCY)
                .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        let op = add_batch_operation(&mut sc, "annotate", &files(&[2]), false, BatchKind::Other, |_| true)
            .unwrap();
        assert_eq!(op.current_status(), BatchStatus::Running);
    }

    #[test]
    fn test_error_of_same_operation_is_resumed() {
        let mut sc = config();
        add_batch_operation(&mut sc, "load", &files(&[1, 2]), false, BatchKind::Load, NO_CONCURRENCY)
            .unwrap();
        set_status(&mut sc, BatchStatus::Error, "load", &files(&[1, 2])).unwrap();

        let op = add_batch_operation(&mut sc, "load", &files(&[1, 2]), true, BatchKind::Load, NO_CONCURRENCY)
            .unwrap();
        assert_eq!(op.current_status(), BatchStatus::Running);
        assert_eq!(op.status.len(), 3);
        // Resumed, not re-created.
        assert_eq!(sc.batches.len(), 1);
    }

    #[test]
    fn test_error_of_different_operation_is_arbitrated_by_predicate() {
        let mut sc = config();
        add_batch_operation(&mut sc, "load", &files(&[1]), false, BatchKind::Load, NO_CONCURRENCY)
            .unwrap();
        set_status(&mut sc, BatchStatus::Error, "load", &files(&[1])).unwrap();

        let err =
            add_batch_operation(&mut sc, "annotate", &files(&[2]), false, BatchKind::Other, NO_CONCURRENCY)
                .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        assert!(add_batch_operation(&mut sc, "annotate", &files(&[2]), false, BatchKind::Other, |op| {
            op.kind == BatchKind::Load
        })
        .is_ok());
    }

    #[test]
    fn test_resumed_done_operation_keeps_its_status() {
        let mut sc = config();
        add_batch_operation(&mut sc, "load", &files(&[1]), false, BatchKind::Load, NO_CONCURRENCY)
            .unwrap();
        set_status(&mut sc, BatchStatus::Done, "load", &files(&[1])).unwrap();

        let op = add_batch_operation(&mut sc, "load", &files(&[1]), true, BatchKind::Load, NO_CONCURRENCY)
            .unwrap();
        assert_eq!(op.current_status(), BatchStatus::Done);
    }

    #[test]
    fn test_ready_operations_are_ignored() {
        let mut sc = config();
        sc.batches
            .push(BatchOperation::new("old", files(&[9]), 0, BatchKind::Other));
        assert!(add_batch_operation(&mut sc, "load", &files(&[1]), false, BatchKind::Load, NO_CONCURRENCY)
            .is_ok());
    }

    #[test]
    fn test_set_status_returns_previous() {
        let mut sc = config();
        add_batch_operation(&mut sc, "load", &files(&[1]), false, BatchKind::Load, NO_CONCURRENCY)
            .unwrap();
        let previous = set_status(&mut sc, BatchStatus::Done, "load", &files(&[1])).unwrap();
        assert_eq!(previous, BatchStatus::Running);
    }

    #[test]
    fn test_set_status_of_unknown_operation_fails() {
        let mut sc = config();
        assert!(set_status(&mut sc, BatchStatus::Done, "load", &files(&[1])).is_err());
    }

    #[test]
    fn test_get_operation_finds_newest_match() {
        let mut sc = config();
        sc.batches
            .push(BatchOperation::new("load", files(&[1]), 10, BatchKind::Load));
        sc.batches
            .push(BatchOperation::new("load", files(&[1]), 20, BatchKind::Load));
        let op = get_operation(&sc, "load", &files(&[1])).unwrap();
        assert_eq!(op.timestamp, 20);
    }
}
