//! End-to-end pipeline tests over the in-memory driver: scope enforcement,
//! size limits, archival semantics, and listing.

mod support;

use support::*;

use common::hub::{ListEntries, ListRequest, StoreRequest};
use common::prelude::*;
use drivers::StorageDriver;

#[tokio::test]
async fn scoped_upload_returns_the_public_url() {
    let t = setup_hub_with(
        HubConfig {
            read_url: Some("https://read.example.com".to_string()),
            ..Default::default()
        },
        drivers::DEFAULT_PAGE_SIZE,
    );

    let outcome = t
        .hub
        .handle_store(
            &t.principal,
            "foo/bar",
            store_request(&t.key, &[scope("putFilePrefix", "foo/")], b"hello"),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.public_url,
        format!("https://read.example.com/{}/foo/bar", t.principal)
    );

    let read = t
        .hub
        .driver()
        .perform_read(t.principal.as_str(), "foo/bar")
        .await
        .unwrap();
    assert_eq!(read.stat.content_type.as_deref(), Some("text/plain"));
    assert_eq!(read.into_bytes().await.unwrap().as_ref(), b"hello");
}

#[tokio::test]
async fn upload_outside_the_scoped_prefix_is_rejected() {
    let t = setup_hub();

    let err = t
        .hub
        .handle_store(
            &t.principal,
            "foo/bar",
            store_request(&t.key, &[scope("putFilePrefix", "bar/")], b"hello"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HubError::Validation(_)));
    let stat = t
        .hub
        .driver()
        .perform_stat(t.principal.as_str(), "foo/bar")
        .await
        .unwrap();
    assert!(!stat.exists);
}

#[tokio::test]
async fn missing_authorization_is_rejected() {
    let t = setup_hub();
    let err = t
        .hub
        .handle_store(
            &t.principal,
            "foo/bar",
            StoreRequest {
                authorization: None,
                content_type: None,
                content_length: Some(5),
                stream: one_chunk(b"hello"),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Validation(_)));
}

#[tokio::test]
async fn declared_size_over_the_limit_fails_before_any_write() {
    let t = setup_hub_with(
        HubConfig {
            max_file_upload_size_bytes: 30 * 1024 * 1024,
            ..Default::default()
        },
        drivers::DEFAULT_PAGE_SIZE,
    );

    let err = t
        .hub
        .handle_store(
            &t.principal,
            "big",
            StoreRequest {
                authorization: Some(bearer_token(&t.key, &[])),
                content_type: None,
                content_length: Some(31_457_281),
                stream: one_chunk(b"irrelevant"),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HubError::PayloadTooLarge(_)));
    let stat = t
        .hub
        .driver()
        .perform_stat(t.principal.as_str(), "big")
        .await
        .unwrap();
    assert!(!stat.exists);
}

#[tokio::test]
async fn observed_overflow_of_the_declared_size_fails_and_leaves_nothing() {
    let t = setup_hub();

    // Declares 10 bytes, streams 1000.
    let err = t
        .hub
        .handle_store(
            &t.principal,
            "liar",
            StoreRequest {
                authorization: Some(bearer_token(&t.key, &[])),
                content_type: None,
                content_length: Some(10),
                stream: many_chunks(&[0u8; 100], 10),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HubError::PayloadTooLarge(_)));
    let stat = t
        .hub
        .driver()
        .perform_stat(t.principal.as_str(), "liar")
        .await
        .unwrap();
    assert!(!stat.exists);
}

#[tokio::test]
async fn zero_declared_length_falls_back_to_the_configured_ceiling() {
    let t = setup_hub_with(
        HubConfig {
            max_file_upload_size_bytes: 1024,
            ..Default::default()
        },
        drivers::DEFAULT_PAGE_SIZE,
    );

    // content-length: 0 is not finite; the stream may still carry bytes up to
    // the configured maximum.
    let outcome = t
        .hub
        .handle_store(
            &t.principal,
            "unsized",
            StoreRequest {
                authorization: Some(bearer_token(&t.key, &[])),
                content_type: None,
                content_length: Some(0),
                stream: one_chunk(b"some actual bytes"),
            },
        )
        .await;
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn missing_content_type_defaults_to_octet_stream() {
    let t = setup_hub();
    t.hub
        .handle_store(
            &t.principal,
            "blob",
            StoreRequest {
                authorization: Some(bearer_token(&t.key, &[])),
                content_type: None,
                content_length: Some(3),
                stream: one_chunk(b"abc"),
            },
        )
        .await
        .unwrap();

    let stat = t
        .hub
        .driver()
        .perform_stat(t.principal.as_str(), "blob")
        .await
        .unwrap();
    assert_eq!(stat.content_type.as_deref(), Some("application/octet-stream"));
}

#[tokio::test]
async fn reserved_name_writes_are_refused() {
    let t = setup_hub();
    let err = t
        .hub
        .handle_store(
            &t.principal,
            ".authTimestamp",
            store_request(&t.key, &[], b"{}"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::ConflictingName(_)));
}

#[tokio::test]
async fn archival_overwrite_keeps_exactly_one_historical_sibling() {
    let t = setup_hub();
    let archival = [scope("putFileArchivalPrefix", "foo/")];

    for body in [b"one".as_slice(), b"two".as_slice()] {
        t.hub
            .handle_store(
                &t.principal,
                "foo/bar",
                store_request(&t.key, &archival, body),
            )
            .await
            .unwrap();
    }

    // The canonical object holds the latest body.
    let read = t
        .hub
        .driver()
        .perform_read(t.principal.as_str(), "foo/bar")
        .await
        .unwrap();
    assert_eq!(read.into_bytes().await.unwrap().as_ref(), b"two");

    // An archival-restricted listing sees only the canonical object.
    let restricted = t
        .hub
        .handle_list(
            &t.principal,
            ListRequest {
                authorization: Some(bearer_token(&t.key, &archival)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        entry_names(&restricted),
        vec![Some("foo/bar".to_string())]
    );

    // An unrestricted listing sees the historical sibling too.
    let full = t
        .hub
        .handle_list(
            &t.principal,
            ListRequest {
                authorization: Some(bearer_token(&t.key, &[])),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let names: Vec<String> = entry_names(&full).into_iter().flatten().collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"foo/bar".to_string()));
    let historical = names.iter().find(|n| *n != "foo/bar").unwrap();
    assert!(historical.starts_with("foo/.history."));
    assert!(historical.ends_with(".bar"));
}

#[tokio::test]
async fn archival_delete_tombstones_instead_of_removing() {
    let t = setup_hub();
    let archival = [scope("putFileArchivalPrefix", "foo/")];

    t.hub
        .handle_store(
            &t.principal,
            "foo/bar",
            store_request(&t.key, &archival, b"kept"),
        )
        .await
        .unwrap();
    t.hub
        .handle_delete(
            &t.principal,
            "foo/bar",
            Some(&bearer_token(&t.key, &archival)),
        )
        .await
        .unwrap();

    // Canonical object gone, history retained.
    let stat = t
        .hub
        .driver()
        .perform_stat(t.principal.as_str(), "foo/bar")
        .await
        .unwrap();
    assert!(!stat.exists);

    let full = t
        .hub
        .handle_list(
            &t.principal,
            ListRequest {
                authorization: Some(bearer_token(&t.key, &[])),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let names: Vec<String> = entry_names(&full).into_iter().flatten().collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("foo/.history."));
}

#[tokio::test]
async fn plain_delete_removes_and_missing_objects_surface() {
    let t = setup_hub();

    t.hub
        .handle_store(&t.principal, "doomed", store_request(&t.key, &[], b"x"))
        .await
        .unwrap();
    t.hub
        .handle_delete(&t.principal, "doomed", Some(&bearer_token(&t.key, &[])))
        .await
        .unwrap();

    let err = t
        .hub
        .handle_delete(&t.principal, "doomed", Some(&bearer_token(&t.key, &[])))
        .await
        .unwrap_err();
    assert!(err.is_does_not_exist());
}

#[tokio::test]
async fn delete_scope_is_enforced_independently_of_write_scope() {
    let t = setup_hub();

    t.hub
        .handle_store(&t.principal, "kept/file", store_request(&t.key, &[], b"x"))
        .await
        .unwrap();

    let err = t
        .hub
        .handle_delete(
            &t.principal,
            "kept/file",
            Some(&bearer_token(&t.key, &[scope("deleteFilePrefix", "tmp/")])),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Validation(_)));
}

#[tokio::test]
async fn filtered_out_page_yields_the_null_sentinel() {
    // Page size 1: the historical sibling fills a whole page by itself.
    let t = setup_hub_with(HubConfig::default(), 1);
    let archival = [scope("putFileArchivalPrefix", "foo/")];

    for body in [b"one".as_slice(), b"two".as_slice()] {
        t.hub
            .handle_store(
                &t.principal,
                "foo/bar",
                store_request(&t.key, &archival, body),
            )
            .await
            .unwrap();
    }

    // `.history.` sorts before `bar`, so the first page is pure history;
    // filtering empties it and the sentinel points at the cursor.
    let first = t
        .hub
        .handle_list(
            &t.principal,
            ListRequest {
                authorization: Some(bearer_token(&t.key, &archival)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(entry_names(&first), vec![None]);
    let cursor = first.page.expect("cursor must accompany the sentinel");

    let second = t
        .hub
        .handle_list(
            &t.principal,
            ListRequest {
                authorization: Some(bearer_token(&t.key, &archival)),
                page: Some(cursor),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        entry_names(&second),
        vec![Some("foo/bar".to_string())]
    );
}

#[tokio::test]
async fn stat_listing_carries_sizes() {
    let t = setup_hub();
    t.hub
        .handle_store(&t.principal, "foo/bar", store_request(&t.key, &[], b"hello"))
        .await
        .unwrap();

    let outcome = t
        .hub
        .handle_list(
            &t.principal,
            ListRequest {
                authorization: Some(bearer_token(&t.key, &[])),
                stat: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    match &outcome.entries {
        ListEntries::Stats(entries) => {
            assert_eq!(entries.len(), 1);
            let entry = entries[0].as_ref().unwrap();
            assert_eq!(entry.name, "foo/bar");
            assert_eq!(entry.size, 5);
        }
        other => panic!("expected stat entries, got {other:?}"),
    }
}

#[tokio::test]
async fn listing_requires_a_valid_token_for_the_principal() {
    let t = setup_hub();
    let stranger = k256::ecdsa::SigningKey::random(&mut rand::thread_rng());

    let err = t
        .hub
        .handle_list(
            &t.principal,
            ListRequest {
                authorization: Some(bearer_token(&stranger, &[])),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Validation(_)));
}
