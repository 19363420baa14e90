//! Contract Test: Authorization Gate
//!
//! Constraints verified:
//! - A rejected request never enqueues a control message
//! - Only the owner may mutate a record; admin and staff get no override
//! - Domain mutations, global purge and full listings need admin or staff
//! - Anonymous callers are Forbidden; missing entities are NotFound
//!
//! If this test fails, someone has:
//! - Moved the enqueue before the authorization check
//! - Added a role override to record ownership

mod common;

use common::*;
use http::HeaderMap;
use http::StatusCode;
use uberdns_core::service::{FqdnRequest, NameRequest, RecordRequest};
use uberdns_core::{EntityKind, Error};

fn www(ip: &str) -> RecordRequest {
    RecordRequest {
        name: "www.example.com".to_string(),
        ip_address: ip.to_string(),
    }
}

fn name(name: &str) -> NameRequest {
    NameRequest {
        name: name.to_string(),
    }
}

#[tokio::test]
async fn non_owner_delete_is_forbidden_and_silent() {
    let mut h = harness(RecordingBus::new()).await;

    h.service
        .create_record(&api_key_headers("alice-key"), &www("10.0.0.1"))
        .await
        .expect("owner create succeeds");
    wait_for_terminal(&mut h.events, EntityKind::Record, 1).await;

    let err = h
        .service
        .delete_record(&api_key_headers("bob-key"), &name("www.example.com"))
        .await
        .expect_err("non-owner delete is rejected");
    assert!(matches!(err, Error::Forbidden(_)));
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(h.store.record_count().await, 1);

    h.handle.shutdown().await;
    assert_eq!(h.bus.messages().len(), 1, "only the create was published");
}

#[tokio::test]
async fn rejected_requests_never_enqueue() {
    let h = harness(RecordingBus::new()).await;
    h.service
        .create_record(&api_key_headers("alice-key"), &www("10.0.0.1"))
        .await
        .expect("owner create succeeds");

    let bob = api_key_headers("bob-key");
    let admin = api_key_headers("admin-key");
    let anonymous = HeaderMap::new();

    let rejected = [
        h.service.update_record(&bob, &www("10.9.9.9")).await.err(),
        h.service.update_record(&admin, &www("10.9.9.9")).await.err(),
        h.service
            .purge_record(
                &bob,
                &FqdnRequest {
                    fqdn: "www.example.com".to_string(),
                },
            )
            .await
            .err(),
        h.service.delete_record(&admin, &name("www.example.com")).await.err(),
        h.service.purge_all(&bob).await.err(),
        h.service.create_domain(&bob, &name("example.net")).await.err(),
        h.service.delete_domain(&bob, &name("example.com")).await.err(),
        h.service.create_record(&anonymous, &www("10.0.0.1")).await.err(),
        h.service.purge_all(&anonymous).await.err(),
    ];

    for (i, err) in rejected.iter().enumerate() {
        assert!(
            matches!(err, Some(Error::Forbidden(_))),
            "request {} should be Forbidden, got {:?}",
            i,
            err
        );
    }

    h.handle.shutdown().await;
    assert_eq!(h.bus.messages().len(), 1, "only the create was published");
    assert_eq!(h.store.domain_count().await, 1);
}

#[tokio::test]
async fn missing_entities_are_not_found() {
    let h = harness(RecordingBus::new()).await;
    let alice = api_key_headers("alice-key");

    let err = h
        .service
        .update_record(&alice, &www("10.0.0.1"))
        .await
        .expect_err("no such record");
    assert!(matches!(err, Error::NotFound(_)));

    let err = h
        .service
        .create_record(
            &alice,
            &RecordRequest {
                name: "www.nowhere.test".to_string(),
                ip_address: "10.0.0.1".to_string(),
            },
        )
        .await
        .expect_err("no such domain");
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(err.public_message(), "404 - Not Found");

    h.handle.shutdown().await;
    assert!(h.bus.messages().is_empty());
}

#[tokio::test]
async fn anonymous_lookup_is_forbidden_before_not_found() {
    let h = harness(RecordingBus::new()).await;

    let err = h
        .service
        .update_record(&HeaderMap::new(), &www("10.0.0.1"))
        .await
        .expect_err("anonymous is rejected");
    assert!(matches!(err, Error::Forbidden(_)));

    h.handle.shutdown().await;
}

#[tokio::test]
async fn duplicate_and_invalid_input_are_rejected() {
    let h = harness(RecordingBus::new()).await;
    let alice = api_key_headers("alice-key");

    h.service
        .create_record(&alice, &www("10.0.0.1"))
        .await
        .expect("first create succeeds");

    let err = h
        .service
        .create_record(&api_key_headers("bob-key"), &www("10.0.0.2"))
        .await
        .expect_err("name is taken");
    assert_eq!(err.status_code(), StatusCode::CONFLICT);

    let err = h
        .service
        .create_record(&alice, &www("not-an-ip"))
        .await
        .expect_err("ip is invalid");
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    h.handle.shutdown().await;
    assert_eq!(h.bus.messages().len(), 1);
}

#[tokio::test]
async fn operators_manage_domains_and_listings() {
    let mut h = harness(RecordingBus::new()).await;
    let admin = api_key_headers("admin-key");
    let staff = api_key_headers("staff-key");

    h.service
        .create_domain(&admin, &name("example.net."))
        .await
        .expect("admin creates domain");
    let domains = h.service.list_domains(&staff).await.expect("staff lists");
    assert_eq!(domains.len(), 2);
    assert!(domains.iter().any(|d| d.name == "example.net"));

    h.service
        .create_record(
            &api_key_headers("bob-key"),
            &RecordRequest {
                name: "ns.example.net".to_string(),
                ip_address: "192.0.2.53".to_string(),
            },
        )
        .await
        .expect("bob creates record");

    assert_eq!(h.service.list_all_records(&staff).await.unwrap().len(), 1);
    assert!(h
        .service
        .list_all_records(&api_key_headers("alice-key"))
        .await
        .is_err());
    assert!(h
        .service
        .list_records(&api_key_headers("alice-key"))
        .await
        .unwrap()
        .is_empty());

    let deleted = h
        .service
        .delete_domain(&staff, &name("example.net"))
        .await
        .expect("staff deletes domain");
    assert_eq!(deleted.name, "example.net");
    assert_eq!(h.store.record_count().await, 0);

    collect_events(&mut h.events, |seen| {
        count_terminal(seen, EntityKind::Domain) >= 2 && count_terminal(seen, EntityKind::Record) >= 2
    })
    .await;
    let create_then_purge = vec![
        uberdns_core::CacheAction::Create,
        uberdns_core::CacheAction::Purge,
    ];
    for kind in [EntityKind::Domain, EntityKind::Record] {
        let actions: Vec<_> = h.bus.messages_of(kind).iter().map(|m| m.action).collect();
        assert_eq!(actions, create_then_purge, "{} messages", kind);
    }

    h.handle.shutdown().await;
}
