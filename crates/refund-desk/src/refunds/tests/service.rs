use std::sync::Arc;

use super::common::*;
use crate::refunds::domain::RequestMetadata;
use crate::refunds::repository::{RefundRepository, RepositoryError};
use crate::refunds::service::SubmissionError;
use crate::refunds::storage::InMemoryRefundRepository;
use crate::refunds::validation::{RawFields, REQUIRED};

fn metadata() -> RequestMetadata {
    RequestMetadata {
        client_ip: Some("203.0.113.9".to_string()),
        user_agent: Some("curl/8.5".to_string()),
    }
}

#[test]
fn valid_submission_creates_one_pending_record() {
    let (service, repository, _) = build_service();

    let record = service
        .submit(&valid_fields(), metadata())
        .expect("valid submission is stored");

    let stored = repository.all().expect("repository readable");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], record);
    assert!(!record.processed());
    assert_eq!(record.processed_at(), None);
    assert_eq!(record.created_at, record.updated_at);
    assert_eq!(record.refund_amount.minor_units(), 5000);
    assert_eq!(record.ip_address.as_deref(), Some("203.0.113.9"));
    assert_eq!(record.user_agent.as_deref(), Some("curl/8.5"));
}

#[test]
fn each_submission_gets_a_distinct_identifier() {
    let (service, repository, _) = build_service();

    let first = service.submit(&valid_fields(), metadata()).expect("first");
    let second = service.submit(&valid_fields(), metadata()).expect("second");

    assert_ne!(first.request_id, second.request_id);
    let ids: Vec<_> = repository
        .all()
        .expect("repository readable")
        .into_iter()
        .map(|record| record.request_id)
        .collect();
    assert_eq!(ids, vec![first.request_id, second.request_id]);
}

#[test]
fn missing_field_stores_nothing_and_sends_nothing() {
    let (service, repository, mail) = build_service();
    let mut fields = RawFields::new();
    for (name, value) in form_pairs(&valid_fields()) {
        if name != "bank_name" {
            fields.insert(name, value);
        }
    }

    match service.submit(&fields, metadata()) {
        Err(SubmissionError::Validation(errors)) => {
            assert_eq!(errors.field("bank_name"), [REQUIRED.to_string()]);
            assert_eq!(errors.len(), 1);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert!(repository.all().expect("repository readable").is_empty());
    assert!(mail.messages().is_empty());
}

#[test]
fn operator_is_notified_with_masked_details() {
    let (service, _, mail) = build_service();

    let record = service
        .submit(&valid_fields(), metadata())
        .expect("valid submission");

    let messages = mail.messages();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.to, vec!["refunds@desk.test".to_string()]);
    assert_eq!(
        message.subject,
        format!("New Refund Request - {}", record.request_id)
    );
    assert!(message.body.contains("Card Number: ************1111"));
    assert!(message.body.contains("Account Number: ****5678"));
    assert!(message.body.contains("Amount: $50.00"));
    assert!(!message.body.contains("4111111111111111"));
    assert!(!message.body.contains("q7z"));
}

#[test]
fn notification_failure_does_not_fail_the_submission() {
    let repository = Arc::new(InMemoryRefundRepository::default());
    let service = service_with(repository.clone(), Arc::new(FailingMail));

    let record = service
        .submit(&valid_fields(), metadata())
        .expect("stored despite mail failure");

    let stored = repository
        .fetch(&record.request_id)
        .expect("repository readable");
    assert_eq!(stored, Some(record));
}

#[test]
fn persistence_failure_is_surfaced() {
    let (_, _, mail) = build_service();
    let service = service_with(Arc::new(UnavailableRepository), mail.clone());

    match service.submit(&valid_fields(), metadata()) {
        Err(SubmissionError::Repository(RepositoryError::Unavailable(reason))) => {
            assert_eq!(reason, "database offline");
        }
        other => panic!("expected repository failure, got {other:?}"),
    }
    assert!(mail.messages().is_empty());
}

#[test]
fn list_all_returns_storage_order() {
    let (service, _, _) = build_service();
    let alice = service.submit(&valid_fields(), metadata()).expect("alice");
    let bob = service
        .submit(&fields_with("recipient_name", "Bob"), metadata())
        .expect("bob");

    let listed: Vec<_> = service
        .list_all()
        .expect("listing")
        .into_iter()
        .map(|record| record.recipient_name)
        .collect();
    assert_eq!(listed, vec![alice.recipient_name, bob.recipient_name]);
}
