//! File and sample admission checks run before loading a file into a
//! study.

use genocat_core::error::CatalogError;
use genocat_core::result::CatalogResult;
use genocat_core::types::id::{FileId, SampleId};
use genocat_core::types::study::StudyConfiguration;

/// The samples a file declares, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileSampleManifest {
    /// Sample names in the order the file declares them.
    pub sample_names: Vec<String>,
}

impl FileSampleManifest {
    /// Manifest over a list of sample names.
    pub fn new(sample_names: Vec<String>) -> Self {
        Self { sample_names }
    }

    /// Declared position of a sample, if present.
    pub fn position(&self, sample_name: &str) -> Option<usize> {
        self.sample_names.iter().position(|s| s == sample_name)
    }
}

/// Register the samples of a file in the study configuration before the
/// file is loaded.
///
/// With explicit `name:id` mappings every entry is validated: well-formed,
/// the sample present in the file, and not conflicting with an existing
/// mapping. Without mappings, ids are auto-assigned with this priority:
/// the sample's position in the file if free, the current sample count if
/// free, `max(existing)+1` otherwise. Finally the samples-in-file entry
/// must match the file's declared sample set exactly.
pub fn check_and_update_study_configuration(
    config: &mut StudyConfiguration,
    file_id: FileId,
    manifest: &FileSampleManifest,
    sample_mappings: Option<&[String]>,
) -> CatalogResult<()> {
    match sample_mappings {
        Some(mappings) if !mappings.is_empty() => {
            apply_explicit_mappings(config, manifest, mappings)?
        }
        _ => auto_assign_sample_ids(config, manifest),
    }
    check_samples_in_file(config, file_id, manifest)
}

fn apply_explicit_mappings(
    config: &mut StudyConfiguration,
    manifest: &FileSampleManifest,
    mappings: &[String],
) -> CatalogResult<()> {
    for entry in mappings {
        let (sample_name, id_text) = entry.split_once(':').ok_or_else(|| {
            CatalogError::invalid_argument(format!("Param {entry} is malformed"))
        })?;
        let sample_id: i64 = id_text.parse().map_err(|_| {
            CatalogError::invalid_argument(format!("SampleId {id_text} is not an integer"))
        })?;

        if manifest.position(sample_name).is_none() {
            return Err(CatalogError::precondition(format!(
                "Given sampleName '{sample_name}' is not in the input file"
            )));
        }
        match config.sample_ids.get(sample_name) {
            None => {
                config
                    .sample_ids
                    .insert(sample_name.to_string(), SampleId::new(sample_id));
            }
            Some(existing) if existing.get() != sample_id => {
                return Err(CatalogError::precondition(format!(
                    "Sample {sample_name}:{sample_id} was already present. It was in the \
                     study configuration with a different sampleId: {existing}"
                )));
            }
            Some(_) => {}
        }
    }

    let missing: Vec<&String> = manifest
        .sample_names
        .iter()
        .filter(|sample| !config.sample_ids.contains_key(*sample))
        .collect();
    if !missing.is_empty() {
        return Err(CatalogError::precondition(format!(
            "Samples {missing:?} have not been assigned a sampleId"
        )));
    }
    Ok(())
}

fn auto_assign_sample_ids(config: &mut StudyConfiguration, manifest: &FileSampleManifest) {
    let mut max_id = config
        .sample_ids
        .values()
        .map(|id| id.get())
        .max()
        .unwrap_or(0);

    for sample in &manifest.sample_names {
        if config.sample_ids.contains_key(sample) {
            continue;
        }
        let taken = |candidate: i64| config.sample_ids.values().any(|id| id.get() == candidate);

        let position = manifest.position(sample).unwrap_or_default() as i64;
        let sample_count = config.sample_ids.len() as i64;
        let sample_id = if position != 0 && !taken(position) {
            position
        } else if sample_count != 0 && !taken(sample_count) {
            sample_count
        } else {
            max_id + 1
        };

        config
            .sample_ids
            .insert(sample.clone(), SampleId::new(sample_id));
        max_id = max_id.max(sample_id);
    }
}

fn check_samples_in_file(
    config: &mut StudyConfiguration,
    file_id: FileId,
    manifest: &FileSampleManifest,
) -> CatalogResult<()> {
    match config.samples_in_files.get(&file_id) {
        Some(sample_ids) => {
            let missing: Vec<&String> = manifest
                .sample_names
                .iter()
                .filter(|sample| {
                    config
                        .sample_ids
                        .get(*sample)
                        .is_none_or(|id| !sample_ids.contains(id))
                })
                .collect();
            if !missing.is_empty() {
                return Err(CatalogError::precondition(format!(
                    "Samples {missing:?} were not in file {file_id}"
                )));
            }
            if sample_ids.len() != manifest.sample_names.len() {
                return Err(CatalogError::precondition(format!(
                    "Incorrect number of samples in file {file_id}"
                )));
            }
        }
        None => {
            let mut sample_ids = Vec::with_capacity(manifest.sample_names.len());
            for sample in &manifest.sample_names {
                if let Some(id) = config.sample_ids.get(sample) {
                    if !sample_ids.contains(id) {
                        sample_ids.push(*id);
                    }
                }
            }
            config.samples_in_files.insert(file_id, sample_ids);
        }
    }
    Ok(())
}

/// Check that a file `(name, id)` can be registered in the study
/// configuration, allocating an id when `file_id` is negative.
///
/// Fails when the name maps to a different id, the id maps to a different
/// name, or the id is already indexed.
pub fn check_new_file(
    config: &mut StudyConfiguration,
    file_id: i64,
    file_name: &str,
) -> CatalogResult<FileId> {
    let names_by_id = StudyConfiguration::inverse_map(&config.file_ids);

    let file_id = if file_id < 0 {
        match config.file_ids.get(file_name) {
            Some(existing) => existing.get(),
            None => {
                let next = config
                    .file_ids
                    .values()
                    .map(|id| id.get())
                    .max()
                    .unwrap_or(0)
                    + 1;
                config.file_ids.insert(file_name.to_string(), FileId::new(next));
                next
            }
        }
    } else {
        file_id
    };

    if let Some(existing) = config.file_ids.get(file_name) {
        if existing.get() != file_id {
            return Err(CatalogError::precondition(format!(
                "File {file_name} ({file_id}) has a different fileId in the study {} ({}): \
                 {file_name} ({existing})",
                config.study_name, config.study_id
            )));
        }
    }
    if let Some(existing_name) = names_by_id.get(&FileId::new(file_id)) {
        if existing_name != file_name {
            return Err(CatalogError::precondition(format!(
                "File {file_name} ({file_id}) has a different fileName in the study \
                 configuration: {existing_name} ({file_id})"
            )));
        }
    }
    if config.indexed_files.contains(&FileId::new(file_id)) {
        return Err(CatalogError::conflict(format!(
            "File {file_name} ({file_id}) was already indexed"
        )));
    }
    Ok(FileId::new(file_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use genocat_core::error::ErrorKind;
    use genocat_core::types::id::StudyId;

    fn config() -> StudyConfiguration {
        StudyConfiguration::new(StudyId::new(1), "platinum")
    }

    fn manifest(names: &[&str]) -> FileSampleManifest {
        FileSampleManifest::new(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_explicit_mappings_are_applied() {
        let mut sc = config();
        let m = manifest(&["NA12877", "NA12878"]);
        check_and_update_study_configuration(
            &mut sc,
            FileId::new(10),
            &m,
            Some(&["NA12877:100".to_string(), "NA12878:101".to_string()]),
        )
        .unwrap();
        assert_eq!(sc.sample_ids["NA12877"], SampleId::new(100));
        assert_eq!(
            sc.samples_in_files[&FileId::new(10)],
            vec![SampleId::new(100), SampleId::new(101)]
        );
    }

    #[test]
    fn test_malformed_mapping_is_rejected() {
        let mut sc = config();
        let m = manifest(&["NA12877"]);
        let err = check_and_update_study_configuration(
            &mut sc,
            FileId::new(10),
            &m,
            Some(&["NA12877".to_string()]),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_mapping_for_sample_not_in_file_is_rejected() {
        let mut sc = config();
        let m = manifest(&["NA12877"]);
        let err = check_and_update_study_configuration(
            &mut sc,
            FileId::new(10),
            &m,
            Some(&["NA12999:5".to_string()]),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Precondition);
    }

    #[test]
    fn test_conflicting_mapping_is_rejected() {
        let mut sc = config();
        sc.sample_ids.insert("NA12877".into(), SampleId::new(7));
        let m = manifest(&["NA12877"]);
        let err = check_and_update_study_configuration(
            &mut sc,
            FileId::new(10),
            &m,
            Some(&["NA12877:8".to_string()]),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Precondition);
    }

    #[test]
    fn test_incomplete_mappings_are_rejected() {
        let mut sc = config();
        let m = manifest(&["NA12877", "NA12878"]);
        let err = check_and_update_study_configuration(
            &mut sc,
            FileId::new(10),
            &m,
            Some(&["NA12877:1".to_string()]),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Precondition);
    }

    #[test]
    fn test_auto_assignment_in_empty_study_is_sequential() {
        let mut sc = config();
        let m = manifest(&["s0", "s1", "s2"]);
        check_and_update_study_configuration(&mut sc, FileId::new(10), &m, None).unwrap();
        // Position 0 and the zero sample count never assign directly, so
        // the first sample takes max+1; the rest follow suit.
        assert_eq!(sc.sample_ids["s0"], SampleId::new(1));
        assert_eq!(sc.sample_ids["s1"], SampleId::new(2));
        assert_eq!(sc.sample_ids["s2"], SampleId::new(3));
    }

    #[test]
    fn test_auto_assignment_prefers_free_file_position() {
        let mut sc = config();
        sc.sample_ids.insert("known".into(), SampleId::new(5));
        let m = manifest(&["known", "fresh"]);
        check_and_update_study_configuration(&mut sc, FileId::new(10), &m, None).unwrap();
        // "fresh" sits at position 1, which is free, so the position wins
        // over the sample count and max+1.
        assert_eq!(sc.sample_ids["fresh"], SampleId::new(1));
    }

    #[test]
    fn test_auto_assignment_falls_back_to_max_plus_one() {
        let mut sc = config();
        sc.sample_ids.insert("old1".into(), SampleId::new(1));
        sc.sample_ids.insert("old2".into(), SampleId::new(2));
        let m = manifest(&["old1", "new1"]);
        check_and_update_study_configuration(&mut sc, FileId::new(10), &m, None).unwrap();
        // Position 1 and the sample count 2 are both taken, so max+1.
        assert_eq!(sc.sample_ids["new1"], SampleId::new(3));
    }

    #[test]
    fn test_existing_samples_in_file_must_match_exactly() {
        let mut sc = config();
        sc.sample_ids.insert("a".into(), SampleId::new(1));
        sc.sample_ids.insert("b".into(), SampleId::new(2));
        sc.samples_in_files
            .insert(FileId::new(10), vec![SampleId::new(1), SampleId::new(2)]);

        // Exact match passes.
        check_and_update_study_configuration(&mut sc, FileId::new(10), &manifest(&["a", "b"]), None)
            .unwrap();

        // A sample missing from the stored set fails.
        let err = check_and_update_study_configuration(
            &mut sc,
            FileId::new(10),
            &manifest(&["a", "c"]),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Precondition);

        // A subset fails on the count check.
        let err = check_and_update_study_configuration(
            &mut sc,
            FileId::new(10),
            &manifest(&["a"]),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Precondition);
    }

    #[test]
    fn test_check_new_file_allocates_negative_ids() {
        let mut sc = config();
        sc.file_ids.insert("a.vcf".into(), FileId::new(1));
        let id = check_new_file(&mut sc, -1, "b.vcf").unwrap();
        assert_eq!(id, FileId::new(2));
        assert_eq!(sc.file_ids["b.vcf"], FileId::new(2));
    }

    #[test]
    fn test_check_new_file_rejects_conflicts() {
        let mut sc = config();
        sc.file_ids.insert("a.vcf".into(), FileId::new(1));

        let err = check_new_file(&mut sc, 2, "a.vcf").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Precondition);

        let err = check_new_file(&mut sc, 1, "b.vcf").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Precondition);
    }

    #[test]
    fn test_check_new_file_rejects_indexed_files() {
        let mut sc = config();
        sc.file_ids.insert("a.vcf".into(), FileId::new(1));
        sc.indexed_files.insert(FileId::new(1));
        let err = check_new_file(&mut sc, 1, "a.vcf").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }
}
