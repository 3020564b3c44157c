//! Conditional retrieval: serve a payload only when the caller's copy is stale.
//!
//! A resource exposes two accessors. The fingerprint accessor reads only the
//! version columns (identity and last-modified instant) and is cheap; the
//! payload accessor materialises the full body. [`resolve`] consults the
//! fingerprint first and skips the payload read entirely when the caller
//! already holds the current version.
//!
//! The two reads are not atomic. A writer landing between them can make the
//! payload newer than the fingerprint it is served with; the next request
//! then sees a different fingerprint and refetches, so the window only ever
//! causes one extra round trip. If the resource disappears between the reads
//! the outcome is [`ConditionalError::NotFound`].

use std::fmt;
use std::future::Future;

use metrics::counter;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::repos::CollectionVersion;

pub const METRIC_NOT_MODIFIED: &str = "vor_conditional_not_modified_total";
pub const METRIC_PAYLOAD: &str = "vor_conditional_payload_total";
pub const METRIC_NOT_FOUND: &str = "vor_conditional_not_found_total";

const FINGERPRINT_BYTES: usize = 16;

/// Opaque version token for one resource snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of a single row identified by `kind` and `id`.
    pub fn of_instant(kind: &str, id: &str, updated_at: OffsetDateTime) -> Self {
        Self::digest(&format!(
            "{kind}:{id}:{}",
            updated_at.unix_timestamp_nanos()
        ))
    }

    /// Fingerprint of a derived collection view. `key` distinguishes views
    /// over the same table (filters, pages).
    pub fn of_collection(kind: &str, key: &str, version: CollectionVersion) -> Self {
        Self::digest(&format!("{kind}:{key}:{}", version.0))
    }

    fn digest(material: &str) -> Self {
        let hash = Sha256::digest(material.as_bytes());
        Self(hex::encode(&hash[..FINGERPRINT_BYTES]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, validator: &str) -> bool {
        self.0.as_bytes() == validator.as_bytes()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a conditional read for an existing resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<T> {
    NotModified,
    Payload { body: T, fingerprint: Fingerprint },
}

impl<T> Decision<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decision<U> {
        match self {
            Decision::NotModified => Decision::NotModified,
            Decision::Payload { body, fingerprint } => Decision::Payload {
                body: f(body),
                fingerprint,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ConditionalError<E> {
    #[error("resource not found")]
    NotFound,
    #[error(transparent)]
    Upstream(E),
}

/// Resolve a conditional read.
///
/// `fingerprint` yields `None` when the resource does not exist. `payload` is
/// invoked at most once, and only after the fingerprint did not match.
pub async fn resolve<T, E, Fp, Pf, Pl>(
    validator: Option<&str>,
    fingerprint: Fp,
    payload: Pf,
) -> Result<Decision<T>, ConditionalError<E>>
where
    Fp: Future<Output = Result<Option<Fingerprint>, E>>,
    Pf: FnOnce() -> Pl,
    Pl: Future<Output = Result<Option<T>, E>>,
{
    let Some(current) = fingerprint.await.map_err(ConditionalError::Upstream)? else {
        counter!(METRIC_NOT_FOUND).increment(1);
        return Err(ConditionalError::NotFound);
    };

    if validator.is_some_and(|token| current.matches(token)) {
        counter!(METRIC_NOT_MODIFIED).increment(1);
        return Ok(Decision::NotModified);
    }

    match payload().await.map_err(ConditionalError::Upstream)? {
        Some(body) => {
            counter!(METRIC_PAYLOAD).increment(1);
            Ok(Decision::Payload {
                body,
                fingerprint: current,
            })
        }
        None => {
            counter!(METRIC_NOT_FOUND).increment(1);
            Err(ConditionalError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use time::macros::datetime;

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct StoreDown;

    struct Source {
        fingerprint: Option<Fingerprint>,
        body: Option<&'static str>,
        payload_calls: AtomicUsize,
    }

    impl Source {
        fn existing(fp: &str) -> Self {
            Self {
                fingerprint: Some(Fingerprint(fp.to_string())),
                body: Some("V1"),
                payload_calls: AtomicUsize::new(0),
            }
        }

        fn missing() -> Self {
            Self {
                fingerprint: None,
                body: None,
                payload_calls: AtomicUsize::new(0),
            }
        }

        async fn fingerprint(&self) -> Result<Option<Fingerprint>, StoreDown> {
            Ok(self.fingerprint.clone())
        }

        async fn payload(&self) -> Result<Option<&'static str>, StoreDown> {
            self.payload_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body)
        }

        fn calls(&self) -> usize {
            self.payload_calls.load(Ordering::SeqCst)
        }
    }

    async fn run(
        source: &Source,
        validator: Option<&str>,
    ) -> Result<Decision<&'static str>, ConditionalError<StoreDown>> {
        resolve(validator, source.fingerprint(), || source.payload()).await
    }

    #[test]
    fn fingerprint_is_stable_for_same_instant() {
        let at = datetime!(2024-03-01 12:00:00.123456 UTC);
        let first = Fingerprint::of_instant("vehicle", "v1", at);
        let second = Fingerprint::of_instant("vehicle", "v1", at);
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), FINGERPRINT_BYTES * 2);
    }

    #[test]
    fn fingerprint_changes_with_instant_kind_and_identity() {
        let at = datetime!(2024-03-01 12:00 UTC);
        let base = Fingerprint::of_instant("vehicle", "v1", at);

        assert_ne!(
            base,
            Fingerprint::of_instant("vehicle", "v1", at + time::Duration::microseconds(1))
        );
        assert_ne!(base, Fingerprint::of_instant("vehicle-status", "v1", at));
        assert_ne!(base, Fingerprint::of_instant("vehicle", "v2", at));
    }

    #[test]
    fn collection_fingerprint_tracks_version_and_key() {
        let before = Fingerprint::of_collection("vehicles", "", CollectionVersion(3));
        let after = Fingerprint::of_collection("vehicles", "", CollectionVersion(4));
        assert_ne!(before, after);
        assert_ne!(
            before,
            Fingerprint::of_collection("vehicles", "region=central", CollectionVersion(3))
        );
        assert_ne!(before, Fingerprint::of_collection("summary", "", CollectionVersion(3)));
    }

    #[tokio::test]
    async fn matching_validator_short_circuits() {
        let source = Source::existing("abc");
        let decision = run(&source, Some("abc")).await.expect("resolved");

        assert_eq!(decision, Decision::NotModified);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn absent_or_stale_validator_fetches_once() {
        for validator in [None, Some("stale"), Some("ABC"), Some("")] {
            let source = Source::existing("abc");
            let decision = run(&source, validator).await.expect("resolved");

            assert_eq!(
                decision,
                Decision::Payload {
                    body: "V1",
                    fingerprint: Fingerprint("abc".into()),
                }
            );
            assert_eq!(source.calls(), 1, "validator {validator:?}");
        }
    }

    #[tokio::test]
    async fn missing_resource_wins_over_any_validator() {
        for validator in [None, Some("abc"), Some("*")] {
            let source = Source::missing();
            let outcome = run(&source, validator).await;

            assert!(matches!(outcome, Err(ConditionalError::NotFound)));
            assert_eq!(source.calls(), 0);
        }
    }

    #[tokio::test]
    async fn payload_vanishing_after_fingerprint_is_not_found() {
        let source = Source {
            body: None,
            ..Source::existing("abc")
        };
        let outcome = run(&source, None).await;

        assert!(matches!(outcome, Err(ConditionalError::NotFound)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn upstream_failures_are_surfaced_unchanged() {
        let fingerprint_down = resolve::<(), _, _, _, _>(
            Some("abc"),
            async { Err::<Option<Fingerprint>, _>(StoreDown) },
            || async { Ok::<_, StoreDown>(Some(())) },
        )
        .await;
        assert!(matches!(fingerprint_down, Err(ConditionalError::Upstream(StoreDown))));

        let payload_calls = AtomicUsize::new(0);
        let payload_down = resolve::<(), _, _, _, _>(
            None,
            async { Ok::<_, StoreDown>(Some(Fingerprint("abc".into()))) },
            || async {
                payload_calls.fetch_add(1, Ordering::SeqCst);
                Err::<Option<()>, _>(StoreDown)
            },
        )
        .await;
        assert!(matches!(payload_down, Err(ConditionalError::Upstream(StoreDown))));
        assert_eq!(payload_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn update_between_requests_yields_new_etag() {
        let v1 = datetime!(2024-03-01 12:00 UTC);
        let before = Fingerprint::of_instant("vehicle", "V1", v1);
        let after = Fingerprint::of_instant("vehicle", "V1", v1 + time::Duration::seconds(5));

        let held = before.as_str().to_string();
        let first = resolve::<_, StoreDown, _, _, _>(
            Some(held.as_str()),
            async { Ok(Some(before.clone())) },
            || async { Ok(Some("old")) },
        )
        .await
        .expect("resolved");
        assert_eq!(first, Decision::NotModified);

        let second = resolve::<_, StoreDown, _, _, _>(
            Some(held.as_str()),
            async { Ok(Some(after.clone())) },
            || async { Ok(Some("new")) },
        )
        .await
        .expect("resolved");
        assert_eq!(
            second,
            Decision::Payload {
                body: "new",
                fingerprint: after,
            }
        );
    }
}
