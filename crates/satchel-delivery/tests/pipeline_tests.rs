//! End-to-end tests for the delivery pipeline

mod common;

use camino::Utf8PathBuf;
use common::{sample_request, statuses, MockTransport, TestDirs};
use satchel_bag::{archive, Bag, BagInfo, ChecksumAlgorithm, InnerBagValidator};
use satchel_core::config::SftpSettings;
use satchel_core::{Error, RetryPolicy, SatchelConfig};
use satchel_delivery::{
    DeliveryConfig, DeliveryOutcome, DeliveryPipeline, LocalDirectorySource, RemoteSource,
};
use satchel_ledger::BagStatus::*;
use satchel_ledger::{BagStatus, MemoryStatusLog, StatusLog};
use satchel_transport::filesystem::FilesystemTransport;
use satchel_transport::sftp::SftpTransport;
use satchel_transport::{RemoteHandle, Transport};
use std::fs;
use std::path::Path;
use std::sync::Arc;

const IDENTIFIER: &str = "rac.5494124";

fn pipeline(
    config: DeliveryConfig,
    transport: Arc<dyn Transport>,
) -> (DeliveryPipeline, Arc<MemoryStatusLog>) {
    let log = Arc::new(MemoryStatusLog::new());
    let pipeline = DeliveryPipeline::new(config, log.clone(), transport);
    (pipeline, log)
}

fn open_archive(archive_path: &Path, extract_to: &Path) -> Bag {
    archive::open(archive_path, extract_to).unwrap();
    let entries: Vec<_> = fs::read_dir(extract_to).unwrap().collect();
    assert_eq!(entries.len(), 1, "archive must hold a single top-level directory");
    Bag::open(extract_to.join(IDENTIFIER)).unwrap()
}

#[tokio::test]
async fn test_dry_run_records_full_sequence() {
    let dirs = TestDirs::new();
    let source = LocalDirectorySource::new(dirs.write_payload());
    let transport = Arc::new(MockTransport::default());
    let (pipeline, log) = pipeline(dirs.config(true), transport.clone());

    let outcome = pipeline.deliver(&sample_request(), &source).await.unwrap();

    let archive_path = dirs.export_dir().join("rac.5494124.tar");
    assert_eq!(outcome, DeliveryOutcome::Skipped(archive_path.clone()));
    assert_eq!(
        statuses(log.as_ref(), IDENTIFIER),
        vec![
            Bagging,
            Copying,
            Copied,
            ValidationSkipped,
            Bagged,
            Packing,
            Packed,
            DepositSkipped
        ]
    );
    assert!(archive_path.is_file());
    assert_eq!(transport.sent_count(), 0);
    assert!(!dirs.working_dir().join(IDENTIFIER).exists());

    let latest = log.get_latest_for(IDENTIFIER).unwrap().unwrap();
    assert_eq!(latest.note.as_deref(), Some("dry run"));
}

#[tokio::test]
async fn test_deposit_records_full_sequence() {
    let dirs = TestDirs::new();
    let source = LocalDirectorySource::new(dirs.write_payload());
    let transport = Arc::new(MockTransport::default());
    let (pipeline, log) = pipeline(dirs.config(false), transport.clone());

    let outcome = pipeline.deliver(&sample_request(), &source).await.unwrap();

    let expected = RemoteHandle::Object {
        bucket: "deposits".to_string(),
        key: "incoming/rac.5494124.tar".to_string(),
    };
    assert_eq!(outcome, DeliveryOutcome::Deposited(expected));
    assert_eq!(
        statuses(log.as_ref(), IDENTIFIER),
        vec![
            Bagging,
            Copying,
            Copied,
            ValidationSkipped,
            Bagged,
            Packing,
            Packed,
            Depositing,
            Deposited
        ]
    );

    let sent = transport.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.as_deref(), Some("incoming"));

    let latest = log.get_latest_for(IDENTIFIER).unwrap().unwrap();
    assert_eq!(latest.note.as_deref(), Some("s3://deposits/incoming/rac.5494124.tar"));

    let events = log.get_all_for(IDENTIFIER).unwrap();
    let packed = events.iter().find(|e| e.status == Packed).unwrap();
    assert_eq!(
        packed.note.as_deref(),
        Some(dirs.export_dir().join("rac.5494124.tar").to_str().unwrap())
    );
}

#[tokio::test]
async fn test_archive_holds_valid_bag() {
    let dirs = TestDirs::new();
    let source = LocalDirectorySource::new(dirs.write_payload());
    let mut config = dirs.config(true);
    config.algorithms = vec![ChecksumAlgorithm::Md5, ChecksumAlgorithm::Sha256];
    let (pipeline, _log) = pipeline(config, Arc::new(MockTransport::default()));

    let request = sample_request().with_tag_file("accession.txt", "Accession: 2024.017\n");
    let outcome = pipeline.deliver(&request, &source).await.unwrap();
    let DeliveryOutcome::Skipped(archive_path) = outcome else {
        panic!("expected a skipped deposit, got {:?}", outcome);
    };

    let extract = dirs.temp.path().join("extract");
    let bag = open_archive(&archive_path, &extract);
    let result = bag.validate(true).unwrap();
    assert!(result.is_valid, "{:?}", result.error_message);

    let root = bag.root();
    assert!(root.join("data/letters/1950-01-02.txt").is_file());
    assert!(root.join("manifest-md5.txt").is_file());
    assert!(root.join("manifest-sha256.txt").is_file());
    assert!(root.join("tagmanifest-sha256.txt").is_file());
    assert!(root.join("accession.txt").is_file());

    let bag_info = fs::read_to_string(root.join("bag-info.txt")).unwrap();
    assert!(bag_info.contains("Source-Organization: Rockefeller Archive Center\n"));
    assert!(bag_info.contains("Internal-Sender-Identifier: 5494124\n"));
    assert!(bag_info.contains("Internal-Sender-Description: Correspondence, 1950\n"));

    let metadata = fs::read_to_string(root.join("repository-info.txt")).unwrap();
    assert!(metadata.contains("Title: Correspondence, 1950\n"));
    assert!(metadata.contains("Creator: Program Office\n"));
}

#[tokio::test]
async fn test_sha1_never_produces_tag_manifest() {
    let dirs = TestDirs::new();
    let source = LocalDirectorySource::new(dirs.write_payload());
    let mut config = dirs.config(true);
    config.algorithms = vec![ChecksumAlgorithm::Sha1];
    let (pipeline, _log) = pipeline(config, Arc::new(MockTransport::default()));

    let outcome = pipeline.deliver(&sample_request(), &source).await.unwrap();
    let DeliveryOutcome::Skipped(archive_path) = outcome else {
        panic!("expected a skipped deposit, got {:?}", outcome);
    };

    let extract = dirs.temp.path().join("extract");
    let bag = open_archive(&archive_path, &extract);
    assert!(bag.root().join("manifest-sha1.txt").is_file());
    assert!(!bag.root().join("tagmanifest-sha1.txt").exists());
}

#[tokio::test]
async fn test_identifier_with_context_and_part() {
    let dirs = TestDirs::new();
    let source = LocalDirectorySource::new(dirs.write_payload());
    let (pipeline, log) = pipeline(dirs.config(true), Arc::new(MockTransport::default()));

    let request = sample_request().with_context("c").with_part_id("4");
    pipeline.deliver(&request, &source).await.unwrap();

    assert_eq!(statuses(log.as_ref(), "rac.c-5494124-4").len(), 8);
    assert!(dirs.export_dir().join("rac.c-5494124-4.tar").is_file());
}

#[tokio::test]
async fn test_nested_bag_validated_before_packaging() {
    let dirs = TestDirs::new();
    let source_dir = dirs.source_dir();
    let mut inner = Bag::create(source_dir.join("inner")).unwrap();
    fs::write(inner.payload_dir().join("scan.tif"), b"II*\0").unwrap();
    inner
        .add_bag_info(&BagInfo::new("Digitization Vendor", "scan-1", "Scans"))
        .unwrap();
    inner.add_manifests(&[]).unwrap();

    let log = Arc::new(MemoryStatusLog::new());
    let pipeline = DeliveryPipeline::new(
        dirs.config(true),
        log.clone(),
        Arc::new(MockTransport::default()),
    )
    .with_validator(Arc::new(InnerBagValidator::new("inner").strict(true)));

    let outcome = pipeline
        .deliver(&sample_request(), &LocalDirectorySource::new(&source_dir))
        .await
        .unwrap();

    assert!(matches!(outcome, DeliveryOutcome::Skipped(_)));
    assert_eq!(
        statuses(log.as_ref(), IDENTIFIER)[..5],
        [Bagging, Copying, Copied, Validating, Validated]
    );
}

#[tokio::test]
async fn test_corrupt_nested_bag_recorded_as_failed() {
    let dirs = TestDirs::new();
    let source_dir = dirs.source_dir();
    let mut inner = Bag::create(source_dir.join("inner")).unwrap();
    fs::write(inner.payload_dir().join("scan.tif"), b"II*\0").unwrap();
    inner
        .add_bag_info(&BagInfo::new("Digitization Vendor", "scan-1", "Scans"))
        .unwrap();
    inner.add_manifests(&[]).unwrap();
    fs::write(inner.payload_dir().join("scan.tif"), b"tampered").unwrap();

    let log = Arc::new(MemoryStatusLog::new());
    let pipeline = DeliveryPipeline::new(
        dirs.config(true),
        log.clone(),
        Arc::new(MockTransport::default()),
    )
    .with_validator(Arc::new(InnerBagValidator::new("inner")));

    let outcome = pipeline
        .deliver(&sample_request(), &LocalDirectorySource::new(&source_dir))
        .await
        .unwrap();

    let DeliveryOutcome::Failed(note) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert!(note.starts_with("ValidationError: "), "{}", note);
    assert_eq!(
        statuses(log.as_ref(), IDENTIFIER),
        vec![Bagging, Copying, Copied, Validating, Failed]
    );
    assert!(!dirs.working_dir().join(IDENTIFIER).exists());
    assert!(!dirs.export_dir().join("rac.5494124.tar").exists());
}

#[tokio::test]
async fn test_unreadable_nested_manifest_recorded_as_failed() {
    let dirs = TestDirs::new();
    let source_dir = dirs.source_dir();
    let mut inner = Bag::create(source_dir.join("inner")).unwrap();
    fs::write(inner.payload_dir().join("scan.tif"), b"II*\0").unwrap();
    inner
        .add_bag_info(&BagInfo::new("Digitization Vendor", "scan-1", "Scans"))
        .unwrap();
    inner.add_manifests(&[]).unwrap();
    fs::write(inner.root().join("manifest-md5.txt"), [0xff, 0xfe, 0x00, 0x41]).unwrap();

    let log = Arc::new(MemoryStatusLog::new());
    let pipeline = DeliveryPipeline::new(
        dirs.config(true),
        log.clone(),
        Arc::new(MockTransport::default()),
    )
    .with_validator(Arc::new(InnerBagValidator::new("inner")));

    let outcome = pipeline
        .deliver(&sample_request(), &LocalDirectorySource::new(&source_dir))
        .await
        .unwrap();

    let DeliveryOutcome::Failed(note) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert!(note.starts_with("ValidationError: "), "{}", note);
    assert!(note.contains("not valid UTF-8"), "{}", note);
    assert_eq!(
        statuses(log.as_ref(), IDENTIFIER),
        vec![Bagging, Copying, Copied, Validating, Failed]
    );
    assert!(!dirs.working_dir().join(IDENTIFIER).exists());
}

#[tokio::test]
async fn test_archive_failure_recorded_as_failed() {
    let dirs = TestDirs::new();
    let source = LocalDirectorySource::new(dirs.write_payload());
    let mut config = dirs.config(true);
    config.export_dir = dirs.working_dir().join(IDENTIFIER).join("export");
    let (pipeline, log) = pipeline(config, Arc::new(MockTransport::default()));

    let outcome = pipeline.deliver(&sample_request(), &source).await.unwrap();

    let DeliveryOutcome::Failed(note) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert!(note.starts_with("ArchiveError: "), "{}", note);
    assert!(note.contains("lies inside source"), "{}", note);

    let recorded = statuses(log.as_ref(), IDENTIFIER);
    assert_eq!(recorded[recorded.len() - 3..], [Bagged, Packing, Failed]);
    assert!(!recorded.contains(&Packed));
    assert!(!dirs.working_dir().join(IDENTIFIER).exists());
}

#[tokio::test]
async fn test_transport_failure_recorded_as_failed() {
    let dirs = TestDirs::new();
    let source = LocalDirectorySource::new(dirs.write_payload());
    let transport = Arc::new(MockTransport::failing("503 Slow Down"));
    let (pipeline, log) = pipeline(dirs.config(false), transport);

    let outcome = pipeline.deliver(&sample_request(), &source).await.unwrap();

    let DeliveryOutcome::Failed(note) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert!(note.starts_with("TransportError: "), "{}", note);
    assert!(note.contains("503 Slow Down"));

    let recorded = statuses(log.as_ref(), IDENTIFIER);
    assert_eq!(recorded.last(), Some(&BagStatus::Failed));
    assert_eq!(recorded[recorded.len() - 2], Depositing);
    assert!(!recorded.contains(&Deposited));

    let latest = log.get_latest_for(IDENTIFIER).unwrap().unwrap();
    assert_eq!(latest.note.as_deref(), Some(note.as_str()));
    assert!(!dirs.working_dir().join(IDENTIFIER).exists());
}

#[tokio::test]
async fn test_sftp_deposit_is_unsupported() {
    let dirs = TestDirs::new();
    let source = LocalDirectorySource::new(dirs.write_payload());
    let settings = SftpSettings {
        host: "sftp.example.org".to_string(),
        port: 22,
        username: "archivist".to_string(),
        key_path: Utf8PathBuf::from("/nonexistent/id_ed25519"),
        base_dir: None,
    };
    let transport = Arc::new(SftpTransport::new(&settings, RetryPolicy::default()));
    let (pipeline, log) = pipeline(dirs.config(false), transport);

    let outcome = pipeline.deliver(&sample_request(), &source).await.unwrap();

    let DeliveryOutcome::Failed(note) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert!(note.starts_with("TransportError: "), "{}", note);
    assert!(note.contains("send_file is not supported by the sftp transport"));
    assert_eq!(
        log.get_latest_for(IDENTIFIER).unwrap().unwrap().status,
        BagStatus::Failed
    );
}

#[tokio::test]
async fn test_missing_source_propagates() {
    let dirs = TestDirs::new();
    let source = LocalDirectorySource::new(dirs.temp.path().join("absent"));
    let (pipeline, log) = pipeline(dirs.config(false), Arc::new(MockTransport::default()));

    let err = pipeline.deliver(&sample_request(), &source).await.unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(statuses(log.as_ref(), IDENTIFIER), vec![Bagging, Copying]);
}

#[tokio::test]
async fn test_filesystem_deposit_and_remove_export() {
    let dirs = TestDirs::new();
    let source = LocalDirectorySource::new(dirs.write_payload());
    let remote = dirs.temp.path().join("remote");
    let mut config = dirs.config(false);
    config.remove_export = true;
    let (pipeline, log) = pipeline(config, Arc::new(FilesystemTransport::new(&remote)));

    let outcome = pipeline.deliver(&sample_request(), &source).await.unwrap();

    let deposited = remote.join("incoming/rac.5494124.tar");
    assert_eq!(
        outcome,
        DeliveryOutcome::Deposited(RemoteHandle::Local(deposited.clone()))
    );
    assert!(deposited.is_file());
    assert!(!dirs.export_dir().join("rac.5494124.tar").exists());
    assert_eq!(
        log.get_latest_for(IDENTIFIER).unwrap().unwrap().status,
        Deposited
    );
}

#[tokio::test]
async fn test_payload_pulled_from_remote_source() {
    let dirs = TestDirs::new();
    let remote = dirs.temp.path().join("remote");
    fs::create_dir_all(remote.join("transfers/5494124")).unwrap();
    fs::write(remote.join("transfers/5494124/report.pdf"), b"%PDF-1.4").unwrap();
    let transport: Arc<dyn Transport> = Arc::new(FilesystemTransport::new(&remote));
    let source = RemoteSource::new(transport.clone(), Some("transfers/5494124".to_string()));
    let (pipeline, _log) = pipeline(dirs.config(true), transport);

    let outcome = pipeline.deliver(&sample_request(), &source).await.unwrap();
    let DeliveryOutcome::Skipped(archive_path) = outcome else {
        panic!("expected a skipped deposit, got {:?}", outcome);
    };

    let extract = dirs.temp.path().join("extract");
    let bag = open_archive(&archive_path, &extract);
    assert!(bag.root().join("data/report.pdf").is_file());
}

#[tokio::test]
async fn test_stale_working_directory_replaced() {
    let dirs = TestDirs::new();
    let stale = dirs.working_dir().join(IDENTIFIER).join("data");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("leftover.txt"), "from an earlier attempt").unwrap();

    let source = LocalDirectorySource::new(dirs.write_payload());
    let (pipeline, _log) = pipeline(dirs.config(true), Arc::new(MockTransport::default()));
    let outcome = pipeline.deliver(&sample_request(), &source).await.unwrap();
    let DeliveryOutcome::Skipped(archive_path) = outcome else {
        panic!("expected a skipped deposit, got {:?}", outcome);
    };

    let extract = dirs.temp.path().join("extract");
    let bag = open_archive(&archive_path, &extract);
    assert!(!bag.root().join("data/leftover.txt").exists());
}

#[test]
fn test_config_from_file() {
    let yaml = r#"
working-dir: /srv/satchel/work
export-dir: /srv/satchel/export
repository: rac
source-organization: Rockefeller Archive Center
manifest-algorithms: [md5, SHA-256]
remote-dir: incoming
remotes:
  local:
    type: filesystem
    base-dir: /srv/remote
"#;
    let config = DeliveryConfig::from_config(&SatchelConfig::from_yaml(yaml).unwrap()).unwrap();
    assert_eq!(
        config.algorithms,
        vec![ChecksumAlgorithm::Md5, ChecksumAlgorithm::Sha256]
    );
    assert_eq!(config.remote_dir.as_deref(), Some("incoming"));
    assert!(!config.dry_run);

    let invalid = yaml.replace("SHA-256", "crc32");
    let err = DeliveryConfig::from_config(&SatchelConfig::from_yaml(&invalid).unwrap()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}
