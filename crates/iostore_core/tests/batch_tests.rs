mod common;

use common::{
    bulk_id_at_header_payload, snapshot, utf8_dir, ContainerFixture, HEADER_PAYLOAD_OFFSET,
};
use iostore_core::layout::{CONTAINER_HEADER_CHUNK_TYPE, TOC_HEADER_SIZE};
use iostore_core::{
    BatchCoordinator, BatchOptions, ContainerStatus, Error, ErrorKind, IdRegistry, IdScope,
    Severity, TocDocument, Warning,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use tempfile::TempDir;

const SHARED_ID: u64 = 0x1111_1111_1111_1111;

#[test]
fn test_duplicate_container_id_second_is_reassigned() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let first = ContainerFixture::new(SHARED_ID)
        .with_packages(&[0xA1, 0xA2])
        .write(&root, "ModA_P");
    let second = ContainerFixture::new(SHARED_ID)
        .with_packages(&[0xB1, 0xB2])
        .write(&root, "ModB_P");
    let first_before = snapshot(&first);
    let second_before = snapshot(&second);

    let mut registry = IdRegistry::new();
    registry.seed(IdScope::Container, [0x42]);
    let report = BatchCoordinator::with_registry(registry, BatchOptions::default())
        .run(vec![first.clone(), second.clone()])
        .unwrap();

    assert_eq!(report.containers[0].status, ContainerStatus::Unchanged);
    assert_eq!(report.containers[0].old_id, SHARED_ID);
    assert_eq!(report.containers[0].new_id, 0);

    let reassigned = &report.containers[1];
    assert_eq!(reassigned.status, ContainerStatus::Reassigned);
    assert_eq!(reassigned.old_id, SHARED_ID);
    assert_ne!(reassigned.new_id, SHARED_ID);
    assert_ne!(reassigned.new_id, 0x42);
    assert_ne!(reassigned.new_id, 0);
    assert!(reassigned.warnings.is_empty());

    // first file untouched
    assert_eq!(snapshot(&first), first_before);

    // both files keep their length
    let (toc_after, bulk_after) = snapshot(&second);
    assert_eq!(toc_after.len(), second_before.0.len());
    assert_eq!(bulk_after.len(), second_before.1.len());

    // round-trip through the parser
    let doc = TocDocument::parse(&toc_after).unwrap();
    assert_eq!(doc.container_id(), reassigned.new_id);
    let index = doc.container_header_index().unwrap();
    assert_eq!(doc.entries()[index].id, reassigned.new_id);
    assert_eq!(doc.entries()[index].chunk_type, CONTAINER_HEADER_CHUNK_TYPE);

    // bulk-data copy
    assert_eq!(bulk_id_at_header_payload(&second), reassigned.new_id);

    // only the three 8-byte fields changed
    let changed_toc: Vec<usize> = (0..toc_after.len())
        .filter(|&i| toc_after[i] != second_before.0[i])
        .collect();
    assert!(changed_toc
        .iter()
        .all(|&i| (56..64).contains(&i) || (TOC_HEADER_SIZE + 24..TOC_HEADER_SIZE + 32).contains(&i)));
    let at = HEADER_PAYLOAD_OFFSET as usize;
    assert!((0..bulk_after.len())
        .filter(|&i| bulk_after[i] != second_before.1[i])
        .all(|i| (at..at + 8).contains(&i)));
}

#[test]
fn test_bad_magic_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let first = ContainerFixture::new(SHARED_ID).write(&root, "First");
    let broken = ContainerFixture::new(SHARED_ID).write(&root, "Broken");

    let mut toc = std::fs::read(&broken.toc_path).unwrap();
    toc[0..4].copy_from_slice(b"NOPE");
    std::fs::write(&broken.toc_path, &toc).unwrap();
    let before = snapshot(&broken);

    let report = BatchCoordinator::new(BatchOptions::default())
        .run(vec![first, broken.clone()])
        .unwrap();

    match &report.containers[1].status {
        ContainerStatus::Failed { kind, .. } => assert_eq!(*kind, ErrorKind::Format),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(snapshot(&broken), before);
}

#[test]
fn test_truncated_entry_table_fails_before_writing() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let fixture = ContainerFixture::new(SHARED_ID).with_packages(&[1, 2, 3, 4]);
    assert_eq!(fixture.entry_count(), 5);
    let paths = fixture.write(&root, "Cut");

    let toc = fixture.toc_bytes();
    std::fs::write(&paths.toc_path, &toc[..TOC_HEADER_SIZE + 3 * 12]).unwrap();
    let before = snapshot(&paths);

    let err = TocDocument::from_file_path(paths.toc_path.as_std_path()).unwrap_err();
    assert!(matches!(err, Error::TruncatedFile { .. }));

    let mut registry = IdRegistry::new();
    registry.seed(IdScope::Container, [SHARED_ID]);
    let report = BatchCoordinator::with_registry(registry, BatchOptions::default())
        .run(vec![paths.clone()])
        .unwrap();

    match &report.containers[0].status {
        ContainerStatus::Failed { kind, .. } => assert_eq!(*kind, ErrorKind::Truncated),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(snapshot(&paths), before);
}

#[test]
fn test_missing_container_header_entry_is_consistency_error() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let first = ContainerFixture::new(SHARED_ID).write(&root, "First");
    let orphan = ContainerFixture::new(SHARED_ID)
        .without_header_entry()
        .write(&root, "Orphan");
    let before = snapshot(&orphan);

    let report = BatchCoordinator::new(BatchOptions::default())
        .run(vec![first, orphan.clone()])
        .unwrap();

    let failed = &report.containers[1];
    match &failed.status {
        ContainerStatus::Failed { kind, .. } => assert_eq!(*kind, ErrorKind::Consistency),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(failed.old_id, SHARED_ID);
    assert_eq!(failed.new_id, 0);
    assert_eq!(snapshot(&orphan), before);
}

#[test]
fn test_shared_package_id_is_reported_not_rewritten() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let a = ContainerFixture::new(0xAAAA)
        .with_packages(&[0xBEEF, 0x1])
        .write(&root, "ModA_P");
    let b = ContainerFixture::new(0xBBBB)
        .with_packages(&[0x2, 0xBEEF])
        .write(&root, "ModB_P");
    let before = (snapshot(&a), snapshot(&b));

    let report = BatchCoordinator::new(BatchOptions::default())
        .run(vec![a.clone(), b.clone()])
        .unwrap();

    assert!(report
        .containers
        .iter()
        .all(|c| c.status == ContainerStatus::Unchanged));
    let shared: Vec<(u64, Vec<String>)> = report
        .shared_packages()
        .map(|(id, names)| (id, names.to_vec()))
        .collect();
    assert_eq!(
        shared,
        vec![(0xBEEF, vec!["ModA_P".to_string(), "ModB_P".to_string()])]
    );
    assert_eq!(
        report.containers[1].warnings,
        vec![Warning::SharedPackageId {
            package_id: 0xBEEF,
            containers: vec!["ModA_P".to_string()],
        }]
    );
    assert_eq!((snapshot(&a), snapshot(&b)), before);
}

#[test]
fn test_same_file_processed_repeatedly_gets_fresh_ids() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let paths: Vec<_> = (0..3)
        .map(|i| ContainerFixture::new(SHARED_ID).write(&root, &format!("Copy{i}")))
        .collect();

    let report = BatchCoordinator::new(BatchOptions::default())
        .run(paths.clone())
        .unwrap();

    assert_eq!(report.containers[0].status, ContainerStatus::Unchanged);
    let second = report.containers[1].new_id;
    let third = report.containers[2].new_id;
    assert_ne!(second, 0);
    assert_ne!(third, 0);
    assert_ne!(second, third);
    assert_eq!(report.reassigned_count(), 2);
}

#[test]
fn test_reprocessing_a_patched_file_in_one_batch() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let paths = ContainerFixture::new(SHARED_ID).write(&root, "Twice");

    let report = BatchCoordinator::new(BatchOptions::default())
        .run(vec![paths.clone(), paths.clone()])
        .unwrap();

    assert_eq!(report.containers[0].status, ContainerStatus::Unchanged);
    assert_eq!(report.containers[1].status, ContainerStatus::Reassigned);
    let doc = TocDocument::from_file_path(paths.toc_path.as_std_path()).unwrap();
    assert_eq!(doc.container_id(), report.containers[1].new_id);
}

#[test]
fn test_resulting_ids_are_pairwise_distinct() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let ids = [1u64, 2, 1, 3, 2, 1, 4];
    let paths: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(i, &id)| ContainerFixture::new(id).write(&root, &format!("Mod{i}")))
        .collect();

    let report = BatchCoordinator::new(BatchOptions::default())
        .run(paths.clone())
        .unwrap();

    let final_ids: Vec<u64> = paths
        .iter()
        .map(|p| {
            TocDocument::from_file_path(p.toc_path.as_std_path())
                .unwrap()
                .container_id()
        })
        .collect();
    let unique: HashSet<u64> = final_ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
    assert_eq!(report.reassigned_count(), 3);

    for (container, path) in report.containers.iter().zip(&paths) {
        let expected = if container.new_id == 0 {
            container.old_id
        } else {
            container.new_id
        };
        assert_eq!(bulk_id_at_header_payload(path), expected);
    }
}

#[test]
fn test_missing_bulk_file_is_high_severity_partial_patch() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let first = ContainerFixture::new(SHARED_ID).write(&root, "First");
    let second = ContainerFixture::new(SHARED_ID).write(&root, "NoBulk");
    std::fs::remove_file(&second.bulk_path).unwrap();

    let report = BatchCoordinator::new(BatchOptions::default())
        .run(vec![first, second.clone()])
        .unwrap();

    let container = &report.containers[1];
    assert_eq!(container.status, ContainerStatus::Reassigned);
    assert_eq!(container.max_severity(), Some(Severity::High));
    assert!(matches!(
        container.warnings[0],
        Warning::PartialPatch { .. }
    ));
    let doc = TocDocument::from_file_path(second.toc_path.as_std_path()).unwrap();
    assert_eq!(doc.container_id(), container.new_id);
    assert!(!second.bulk_path.as_std_path().exists());
}

#[test]
fn test_dry_run_reports_without_writing() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let first = ContainerFixture::new(SHARED_ID).write(&root, "First");
    let second = ContainerFixture::new(SHARED_ID).write(&root, "Second");
    let before = snapshot(&second);

    let report = BatchCoordinator::new(BatchOptions {
        dry_run: true,
        ..Default::default()
    })
    .run(vec![first, second.clone()])
    .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.containers[1].status, ContainerStatus::Reassigned);
    assert_ne!(report.containers[1].new_id, 0);
    assert_eq!(snapshot(&second), before);
}

#[test]
fn test_force_reassigns_first_container_too() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let only = ContainerFixture::new(0x77).write(&root, "Only");

    let report = BatchCoordinator::new(BatchOptions {
        force_reassign: true,
        ..Default::default()
    })
    .run(vec![only.clone()])
    .unwrap();

    assert_eq!(report.containers[0].status, ContainerStatus::Reassigned);
    assert_eq!(
        bulk_id_at_header_payload(&only),
        report.containers[0].new_id
    );
}

#[test]
fn test_allocation_exhaustion_aborts_batch() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let first = ContainerFixture::new(SHARED_ID).write(&root, "First");
    let second = ContainerFixture::new(SHARED_ID).write(&root, "Second");
    let third = ContainerFixture::new(0x99).write(&root, "Third");
    let before = snapshot(&second);

    let registry = IdRegistry::with_generator(|| SHARED_ID);
    let mut batch = BatchCoordinator::with_registry(registry, BatchOptions::default());

    batch.process(&first).unwrap();
    let err = batch.process(&second).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::AllocationExhausted { .. }));
    assert_eq!(snapshot(&second), before);
    assert_eq!(batch.report().containers.len(), 1);

    let registry = IdRegistry::with_generator(|| SHARED_ID);
    let result = BatchCoordinator::with_registry(registry, BatchOptions::default())
        .run(vec![first, second, third]);
    assert!(matches!(result, Err(Error::AllocationExhausted { .. })));
}

#[test]
fn test_registry_reflects_batch_after_run() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let a = ContainerFixture::new(SHARED_ID)
        .with_packages(&[10, 11])
        .write(&root, "A");
    let b = ContainerFixture::new(SHARED_ID)
        .with_packages(&[12])
        .write(&root, "B");

    let mut batch = BatchCoordinator::new(BatchOptions::default());
    batch.process(&a).unwrap();
    batch.process(&b).unwrap();
    let (report, registry) = batch.into_parts();

    assert!(registry.is_claimed(IdScope::Container, SHARED_ID));
    assert!(registry.is_claimed(IdScope::Container, report.containers[1].new_id));
    assert_eq!(registry.len(IdScope::Container), 2);
    for id in [10, 11, 12] {
        assert!(registry.is_claimed(IdScope::Chunk, id));
    }
}

#[test]
fn test_perfect_hash_seeds_warned_whether_or_not_reassigned() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let first = ContainerFixture::new(SHARED_ID)
        .with_packages(&[0xC1])
        .with_perfect_hash_seeds(4)
        .write(&root, "First");
    let second = ContainerFixture::new(SHARED_ID)
        .with_packages(&[0xC2])
        .with_perfect_hash_seeds(4)
        .write(&root, "Second");

    let report = BatchCoordinator::new(BatchOptions::default())
        .run(vec![first, second])
        .unwrap();

    let expected = vec![Warning::PerfectHashSeeds {
        seeds: 4,
        without_perfect_hash: 0,
    }];
    assert_eq!(report.containers[0].status, ContainerStatus::Unchanged);
    assert_eq!(report.containers[0].warnings, expected);
    assert_eq!(report.containers[1].status, ContainerStatus::Reassigned);
    assert_eq!(report.containers[1].warnings, expected);
    assert_eq!(report.containers[1].max_severity(), Some(Severity::Info));
}

#[test]
fn test_header_range_past_block_table_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let first = ContainerFixture::new(SHARED_ID).write(&root, "First");
    let spanning = ContainerFixture::new(SHARED_ID)
        .with_header_length(0x20000)
        .write(&root, "Spanning");
    let before = snapshot(&spanning);

    let report = BatchCoordinator::new(BatchOptions::default())
        .run(vec![first, spanning.clone()])
        .unwrap();

    match &report.containers[1].status {
        ContainerStatus::Failed { kind, .. } => assert_eq!(*kind, ErrorKind::Consistency),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(snapshot(&spanning), before);
}

mod lengths {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn test_patching_never_changes_file_lengths(
            ids in proptest::collection::vec(1u64..4, 2..6),
            package_count in 0usize..4,
        ) {
            let dir = TempDir::new().unwrap();
            let root = utf8_dir(&dir);
            let packages: Vec<u64> = (0..package_count as u64).map(|p| 0x5000 + p).collect();
            let paths: Vec<_> = ids
                .iter()
                .enumerate()
                .map(|(i, &id)| {
                    ContainerFixture::new(id)
                        .with_packages(&packages)
                        .write(&root, &format!("Mod{i}"))
                })
                .collect();
            let lengths: Vec<(usize, usize)> = paths
                .iter()
                .map(|p| {
                    let (toc, bulk) = snapshot(p);
                    (toc.len(), bulk.len())
                })
                .collect();

            let report = BatchCoordinator::new(BatchOptions::default())
                .run(paths.clone())
                .unwrap();
            prop_assert_eq!(report.failed_count(), 0);

            for (path, expected) in paths.iter().zip(lengths) {
                let (toc, bulk) = snapshot(path);
                prop_assert_eq!((toc.len(), bulk.len()), expected);
                prop_assert!(toc.ends_with(common::TRAILER));
            }
        }
    }
}
