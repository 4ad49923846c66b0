mod support;

use uuid::Uuid;

use support::*;
use tripdesk::middleware::error_handling::AppError;
use tripdesk::models::{IssueCode, ObjectType, ProposalStatus, ServiceType};
use tripdesk::services::PreflightPath;

#[tokio::test]
async fn test_legacy_version_checked_from_item_rows() {
    let harness = Harness::new();
    harness.mappings.map(ObjectType::Hotel, 11, DEFAULT_SUPPLIER_ID);

    let version_id = Uuid::new_v4();
    harness.seed_legacy_accepted(vec![
        // Mapped to a real supplier: clean
        legacy_item(version_id, 0, ServiceType::Hotel, Some(10), None),
        // Mapped to the generic supplier
        legacy_item(version_id, 1, ServiceType::Hotel, Some(11), None),
        // Catalog object without any mapping
        legacy_item(version_id, 2, ServiceType::Golf, Some(77), None),
        // Hand-typed with its own supplier
        legacy_item(version_id, 3, ServiceType::Transfer, None, Some(555)),
        // Extras never need a supplier
        legacy_item(version_id, 4, ServiceType::Extra, None, None),
    ]);

    let report = harness.state().preflight.check_version(version_id).await.unwrap();

    assert_eq!(report.path, PreflightPath::Legacy);
    assert!(report.ok);
    assert!(report.blocking.is_empty());

    let codes: Vec<(usize, IssueCode)> = report.warnings.iter().map(|w| (w.index, w.code)).collect();
    assert_eq!(
        codes,
        vec![
            (1, IssueCode::LegacyGenericSupplier),
            (2, IssueCode::LegacyMissingMapping),
            (3, IssueCode::LegacyManualSupplier),
        ]
    );

    let missing_mapping = &report.warnings[1];
    assert_eq!(missing_mapping.supplier_id, Some(DEFAULT_SUPPLIER_ID));
    assert_eq!(missing_mapping.supplier_name.as_deref(), Some("Generic Supplier"));
    assert!(missing_mapping.item_id.is_some());

    assert_eq!(report.warnings[2].supplier_id, Some(555));
}

#[tokio::test]
async fn test_legacy_manual_item_without_supplier_blocks() {
    let harness = Harness::new();
    let version_id = Uuid::new_v4();
    harness.seed_legacy_accepted(vec![legacy_item(
        version_id,
        0,
        ServiceType::Transfer,
        None,
        None,
    )]);

    let report = harness.state().preflight.check_version(version_id).await.unwrap();

    assert!(!report.ok);
    assert_eq!(report.blocking[0].code, IssueCode::MissingSupplierForManualItem);
}

#[tokio::test]
async fn test_resolved_version_uses_stored_diagnostics() {
    let harness = Harness::new();
    let mut snapshot = sample_snapshot();
    // No mapping for this course: falls back to the generic supplier
    snapshot["items"][1]["object_id"] = serde_json::json!(6);
    let (_, version_id) = harness.seed_accepted(snapshot).await;

    let report = harness.state().preflight.check_version(version_id).await.unwrap();

    assert_eq!(report.path, PreflightPath::Snapshot);
    assert!(report.ok);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].index, 1);
    assert_eq!(report.warnings[0].code, IssueCode::GenericSupplier);
}

#[tokio::test]
async fn test_missing_version_is_not_found() {
    let harness = Harness::new();

    let err = harness
        .state()
        .preflight
        .check_version(Uuid::new_v4())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_versions_number_sequentially_and_snapshot_is_frozen() {
    let harness = Harness::new();
    let proposal = draft_proposal();
    let proposal_id = proposal.id;
    harness.proposals.insert_proposal(proposal);
    let service = harness.state().proposals;

    let first = service
        .create_version(proposal_id, &raw(sample_snapshot()))
        .await
        .unwrap();
    let second = service
        .create_version(proposal_id, &raw(sample_snapshot()))
        .await
        .unwrap();

    assert_eq!(first.version_number, 1);
    assert_eq!(second.version_number, 2);
    assert_ne!(first.public_token, second.public_token);
    assert_eq!(harness.proposals.get(proposal_id).current_version_id, Some(second.id));

    let items = harness.proposals.items(second.id);
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].erp_supplier_id, Some(4321));
    // Hotel line has no pax of its own
    assert_eq!(items[0].pax, 4);
}

#[tokio::test]
async fn test_accepted_proposal_takes_no_new_versions() {
    let harness = Harness::new();
    let (proposal_id, _) = harness.seed_accepted(sample_snapshot()).await;

    let err = harness
        .state()
        .proposals
        .create_version(proposal_id, &raw(sample_snapshot()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_accepting_foreign_version_is_rejected() {
    let harness = Harness::new();
    let (_, other_version) = harness.seed_accepted(sample_snapshot()).await;

    let proposal = draft_proposal();
    let proposal_id = proposal.id;
    harness.proposals.insert_proposal(proposal);

    let err = harness
        .state()
        .proposals
        .accept(proposal_id, other_version)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(harness.proposals.get(proposal_id).status, ProposalStatus::Draft);
}

#[tokio::test]
async fn test_queue_requires_passing_preflight() {
    let harness = Harness::new();
    let version_id = Uuid::new_v4();
    let (proposal_id, _) = harness.seed_legacy_accepted(vec![legacy_item(
        version_id,
        0,
        ServiceType::Golf,
        None,
        None,
    )]);

    let err = harness
        .state()
        .proposals
        .queue_for_sync(proposal_id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unprocessable { .. }));
    assert_eq!(harness.proposals.get(proposal_id).status, ProposalStatus::Accepted);
}

#[tokio::test]
async fn test_queue_from_draft_is_conflict() {
    let harness = Harness::new();
    let proposal = draft_proposal();
    let proposal_id = proposal.id;
    harness.proposals.insert_proposal(proposal);

    let err = harness
        .state()
        .proposals
        .queue_for_sync(proposal_id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
}
