// ABOUTME: Integration tests for artifact verification polling.
// ABOUTME: Uses paused tokio time to exercise backoff and timeouts deterministically.

mod support;

use skipper::registry::{ArtifactVerifier, PollPolicy, VerifyError};
use std::time::Duration;
use support::{FakeRegistry, image};
use tokio::time::Instant;

const DIGEST: &str = "sha256:abababababababababababababababababababababababababababababababab";

fn policy() -> PollPolicy {
    PollPolicy::new(Duration::from_secs(5), Duration::from_secs(60))
}

/// Test: an already published image resolves on the first lookup
#[tokio::test(start_paused = true)]
async fn published_image_resolves_immediately() {
    let registry = FakeRegistry::new();
    registry.publish("ghcr.io/acme/langgraph:v1.0.1", DIGEST);
    let verifier = ArtifactVerifier::new(&registry);

    let started = Instant::now();
    let resolved = verifier
        .await_artifact(
            &image("ghcr.io/acme/langgraph:v1.0.1"),
            Duration::from_secs(600),
            policy(),
        )
        .await
        .unwrap();

    assert_eq!(resolved.tag(), Some("v1.0.1"));
    assert_eq!(resolved.digest(), Some(DIGEST));
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(registry.lookups("ghcr.io/acme/langgraph:v1.0.1"), 1);
}

/// Test: lookups back off exponentially until the image appears
#[tokio::test(start_paused = true)]
async fn waits_with_backoff_until_published() {
    let registry = FakeRegistry::new();
    registry.publish_after("ghcr.io/acme/mcpserver:v0.5.0", DIGEST, 3);
    let verifier = ArtifactVerifier::new(&registry);

    let started = Instant::now();
    let resolved = verifier
        .await_artifact(
            &image("ghcr.io/acme/mcpserver:v0.5.0"),
            Duration::from_secs(600),
            policy(),
        )
        .await
        .unwrap();

    // Misses at 0s, 5s, 15s; found at 35s
    assert_eq!(registry.lookups("ghcr.io/acme/mcpserver:v0.5.0"), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(35));
    assert_eq!(resolved.digest(), Some(DIGEST));
}

/// Test: a registry without digests yields the tag reference
#[tokio::test(start_paused = true)]
async fn missing_digest_keeps_tag() {
    let registry = FakeRegistry::new();
    registry.publish_without_digest("ghcr.io/acme/langgraph:v1.0.1");
    let verifier = ArtifactVerifier::new(&registry);

    let resolved = verifier
        .await_artifact(
            &image("ghcr.io/acme/langgraph:v1.0.1"),
            Duration::from_secs(60),
            policy(),
        )
        .await
        .unwrap();

    assert_eq!(resolved.to_string(), "ghcr.io/acme/langgraph:v1.0.1");
}

/// Test: the deadline is never overshot
#[tokio::test(start_paused = true)]
async fn times_out_at_deadline() {
    let registry = FakeRegistry::new();
    let verifier = ArtifactVerifier::new(&registry);

    let started = Instant::now();
    let err = verifier
        .await_artifact(
            &image("ghcr.io/acme/langgraph:v9.9.9"),
            Duration::from_secs(100),
            policy(),
        )
        .await
        .unwrap_err();

    assert_eq!(started.elapsed(), Duration::from_secs(100));
    let VerifyError::Timeout {
        image, last_error, ..
    } = err;
    assert_eq!(image.to_string(), "ghcr.io/acme/langgraph:v9.9.9");
    assert!(last_error.is_none());
    // 0, 5, 15, 35, 75, then the final lookup at the deadline
    assert_eq!(registry.lookups("ghcr.io/acme/langgraph:v9.9.9"), 6);
}

/// Test: registry errors are retried and surfaced on timeout
#[tokio::test(start_paused = true)]
async fn registry_errors_are_retried_then_reported() {
    let registry = FakeRegistry::new();
    registry.set_failing(true);
    let verifier = ArtifactVerifier::new(&registry);

    let err = verifier
        .await_artifact(
            &image("ghcr.io/acme/langgraph:v1.0.1"),
            Duration::from_secs(20),
            policy(),
        )
        .await
        .unwrap_err();

    let VerifyError::Timeout { last_error, .. } = &err;
    assert!(last_error.as_deref().unwrap().contains("503"));
    assert!(err.to_string().contains("ghcr.io/acme/langgraph:v1.0.1"));
    assert!(registry.lookups("ghcr.io/acme/langgraph:v1.0.1") > 1);
}

/// Test: a registry that recovers before the deadline succeeds
#[tokio::test(start_paused = true)]
async fn transient_errors_recover() {
    let registry = std::sync::Arc::new(FakeRegistry::new());
    registry.set_failing(true);
    registry.publish("ghcr.io/acme/langgraph:v1.0.1", DIGEST);

    let healer = registry.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        healer.set_failing(false);
    });

    let verifier = ArtifactVerifier::new(registry.as_ref());
    let resolved = verifier
        .await_artifact(
            &image("ghcr.io/acme/langgraph:v1.0.1"),
            Duration::from_secs(120),
            policy(),
        )
        .await
        .unwrap();
    assert_eq!(resolved.digest(), Some(DIGEST));
}
