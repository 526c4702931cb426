//! Hardware allocation under concurrent creation.

mod support;

use std::cell::RefCell;

use serde_json::json;

use bayward_core::allocation::{
    Backoff, HardwareCandidate, HardwareSource, NoBackoff, RetryBudget, acquire_and_create,
};
use bayward_core::client::{RemoteError, TargetQuery};
use bayward_core::error::ReconcileError;

use support::{Call, FakeService, HARDWARE_URI, available_targets, doc, race_error};

/// Remembers which attempts it was asked to pause after.
#[derive(Default)]
struct RecordingBackoff {
    pauses: RefCell<Vec<u32>>,
}

impl Backoff for RecordingBackoff {
    fn pause(&self, attempt: u32) {
        self.pauses.borrow_mut().push(attempt);
    }
}

fn feed() -> HardwareSource {
    HardwareSource::AvailableTargets(TargetQuery::default())
}

#[test]
fn first_usable_target_is_assigned() {
    let fake = FakeService::new();
    *fake.targets.borrow_mut() = available_targets();

    acquire_and_create(
        &fake,
        &doc(json!({"name": "web-01"})),
        &feed(),
        RetryBudget::DEFAULT,
        &NoBackoff,
    )
    .unwrap();

    assert_eq!(fake.creates()[0]["serverHardwareUri"], json!(HARDWARE_URI));
}

#[test]
fn empty_feed_creates_unassigned_profile() {
    let fake = FakeService::new();

    acquire_and_create(
        &fake,
        &doc(json!({"name": "web-01", "serverHardwareUri": null})),
        &feed(),
        RetryBudget::DEFAULT,
        &NoBackoff,
    )
    .unwrap();

    assert!(!fake.creates()[0].contains_key("serverHardwareUri"));
}

#[test]
fn lost_race_refetches_targets_and_pauses() {
    let fake = FakeService::new();
    *fake.targets.borrow_mut() = available_targets();
    fake.create_script
        .borrow_mut()
        .extend([Err(race_error()), Err(race_error())]);
    let backoff = RecordingBackoff::default();

    acquire_and_create(
        &fake,
        &doc(json!({"name": "web-01"})),
        &feed(),
        RetryBudget::new(5),
        &backoff,
    )
    .unwrap();

    assert_eq!(fake.creates().len(), 3);
    assert_eq!(fake.targets_fetched(), 3);
    assert_eq!(*backoff.pauses.borrow(), vec![1, 2]);
}

#[test]
fn informed_hardware_is_reused_without_feed() {
    let fake = FakeService::new();
    fake.create_script.borrow_mut().push_back(Err(race_error()));
    let source = HardwareSource::Informed(HardwareCandidate {
        uri: HARDWARE_URI.to_string(),
        bay: None,
    });

    acquire_and_create(
        &fake,
        &doc(json!({"name": "web-01"})),
        &source,
        RetryBudget::DEFAULT,
        &NoBackoff,
    )
    .unwrap();

    assert_eq!(fake.targets_fetched(), 0);
    assert!(
        fake.creates()
            .iter()
            .all(|created| created["serverHardwareUri"] == json!(HARDWARE_URI))
    );
}

#[test]
fn budget_bounds_attempts_and_pauses() {
    let fake = FakeService::new();
    *fake.create_default.borrow_mut() = Err(race_error());
    let backoff = RecordingBackoff::default();

    let err = acquire_and_create(
        &fake,
        &doc(json!({"name": "web-01"})),
        &feed(),
        RetryBudget::new(4),
        &backoff,
    )
    .unwrap_err();

    assert!(matches!(err, ReconcileError::AllocationExhausted { attempts: 4 }));
    assert_eq!(err.to_string(), "Could not allocate server hardware");
    assert_eq!(fake.count(|call| matches!(call, Call::Create(_))), 4);
    assert_eq!(*backoff.pauses.borrow(), vec![1, 2, 3]);
}

#[test]
fn other_failures_are_not_retried() {
    let fake = FakeService::new();
    *fake.create_default.borrow_mut() = Err(RemoteError::task(Some("OtherError"), "boom"));
    let backoff = RecordingBackoff::default();

    let err = acquire_and_create(
        &fake,
        &doc(json!({"name": "web-01"})),
        &feed(),
        RetryBudget::DEFAULT,
        &backoff,
    )
    .unwrap_err();

    assert!(matches!(err, ReconcileError::Remote(_)));
    assert_eq!(err.to_string(), "boom");
    assert_eq!(fake.creates().len(), 1);
    assert!(backoff.pauses.borrow().is_empty());
}
