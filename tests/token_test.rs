use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rusty_keys::auth::{
    extract_bearer_token, CredentialStore, NewUser, PasswordHasher, TokenDigest, TokenGenerator,
    TokenStore,
};
use rusty_keys::clock::{Clock, ManualClock};
use rusty_keys::config::AuthConfig;
use rusty_keys::constants::TOKEN_ALPHABET;
use rusty_keys::error::RustyKeysError;
use rusty_keys::storage::MemoryStorageProvider;

struct Fixture {
    clock: Arc<ManualClock>,
    credentials: CredentialStore,
    tokens: TokenStore,
    generator: TokenGenerator,
}

fn fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();

    let clock = Arc::new(ManualClock::starting_now());
    let storage = Arc::new(MemoryStorageProvider::new());
    let hasher = PasswordHasher::from_config(&AuthConfig::for_testing()).unwrap();

    Fixture {
        credentials: CredentialStore::new(storage.clone(), hasher, clock.clone()),
        tokens: TokenStore::new(storage),
        generator: TokenGenerator::new(26, clock.clone()),
        clock,
    }
}

async fn user(fx: &Fixture, email: &str) -> i64 {
    fx.credentials
        .create(NewUser::new("John", "Doe", email), "password")
        .await
        .unwrap()
        .id
}

#[test]
fn test_large_sample_uniqueness() {
    let generator = TokenGenerator::new(26, Arc::new(ManualClock::starting_now()));
    let mut plaintexts = HashSet::new();
    let mut digests = HashSet::new();

    for _ in 0..100_000 {
        let token = generator.generate(1, Duration::from_secs(60)).unwrap();
        assert!(plaintexts.insert(token.plaintext));
        assert!(digests.insert(token.digest));
    }
}

#[test]
fn test_plaintext_avoids_ambiguous_characters() {
    let generator = TokenGenerator::new(64, Arc::new(ManualClock::starting_now()));
    for _ in 0..100 {
        let token = generator.generate(1, Duration::from_secs(60)).unwrap();
        assert_eq!(token.plaintext.len(), 64);
        for c in token.plaintext.bytes() {
            assert!(TOKEN_ALPHABET.contains(&c));
            assert!(!b"01IO".contains(&c));
        }
    }
}

#[test]
fn test_digest_is_deterministic() {
    let a = TokenDigest::from_plaintext("ABCDEFGHJKLMNPQRSTUVWXYZ23");
    let b = TokenDigest::from_plaintext("ABCDEFGHJKLMNPQRSTUVWXYZ23");
    let c = TokenDigest::from_plaintext("ABCDEFGHJKLMNPQRSTUVWXYZ24");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.to_base64().len(), 43);
}

#[test]
fn test_generated_debug_redacts_plaintext() {
    let generator = TokenGenerator::new(26, Arc::new(ManualClock::starting_now()));
    let token = generator.generate(1, Duration::from_secs(60)).unwrap();
    assert!(!format!("{:?}", token).contains(&token.plaintext));
}

#[test]
fn test_bearer_extraction() {
    assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
    assert_eq!(extract_bearer_token("bearer   abc"), Some("abc"));
    assert_eq!(extract_bearer_token(""), None);
    assert_eq!(extract_bearer_token("abc"), None);
    assert_eq!(extract_bearer_token("Bearer"), None);
    assert_eq!(extract_bearer_token("Basic abc"), None);
    assert_eq!(extract_bearer_token("Bearer abc def"), None);
}

#[tokio::test]
async fn test_insert_and_find() {
    let fx = fixture();
    let user_id = user(&fx, "john@doe.com").await;

    let generated = fx
        .generator
        .generate(user_id, Duration::from_secs(3600))
        .unwrap();
    let token = fx.tokens.insert(&generated).await.unwrap();

    assert!(token.id > 0);
    assert_eq!(token.user_id, user_id);
    assert!(token.expiry > token.created_at);

    assert_eq!(fx.tokens.find(token.id).await.unwrap(), token);
    assert_eq!(fx.tokens.find_by_digest(&generated.digest).await.unwrap(), token);
    assert_eq!(
        fx.tokens.find_by_plaintext(&generated.plaintext).await.unwrap(),
        token
    );
}

#[tokio::test]
async fn test_lookups_of_absent_tokens() {
    let fx = fixture();
    assert!(matches!(fx.tokens.find(99).await, Err(RustyKeysError::NotFound(_))));
    assert!(matches!(
        fx.tokens.find_by_plaintext("ABCDEFGHJKLMNPQRSTUVWXYZ23").await,
        Err(RustyKeysError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_digest_collision_is_a_conflict() {
    let fx = fixture();
    let user_id = user(&fx, "john@doe.com").await;

    let generated = fx
        .generator
        .generate(user_id, Duration::from_secs(3600))
        .unwrap();
    fx.tokens.insert(&generated).await.unwrap();

    let result = fx.tokens.insert(&generated).await;
    assert!(matches!(result, Err(RustyKeysError::Conflict(_))));
    assert_eq!(fx.tokens.list_for_user(user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_insert_for_unknown_user() {
    let fx = fixture();
    let generated = fx.generator.generate(42, Duration::from_secs(3600)).unwrap();
    assert!(matches!(
        fx.tokens.insert(&generated).await,
        Err(RustyKeysError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_is_newest_first_and_unfiltered() {
    let fx = fixture();
    let user_id = user(&fx, "john@doe.com").await;
    let other = user(&fx, "jane@doe.com").await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let generated = fx.generator.generate(user_id, Duration::from_secs(60)).unwrap();
        ids.push(fx.tokens.insert(&generated).await.unwrap().id);
        fx.clock.advance(chrono::Duration::seconds(30));
    }
    let generated = fx.generator.generate(other, Duration::from_secs(60)).unwrap();
    fx.tokens.insert(&generated).await.unwrap();

    // The first token has expired by now and is still listed
    let listed: Vec<i64> = fx
        .tokens
        .list_for_user(user_id)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    ids.reverse();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn test_deletes_are_idempotent() {
    let fx = fixture();
    let user_id = user(&fx, "john@doe.com").await;

    let first = fx.generator.generate(user_id, Duration::from_secs(60)).unwrap();
    let second = fx.generator.generate(user_id, Duration::from_secs(60)).unwrap();
    let first_token = fx.tokens.insert(&first).await.unwrap();
    fx.tokens.insert(&second).await.unwrap();

    assert!(fx.tokens.delete_by_id(first_token.id).await.unwrap());
    assert!(!fx.tokens.delete_by_id(first_token.id).await.unwrap());
    assert!(fx.tokens.delete_by_plaintext(&second.plaintext).await.unwrap());
    assert!(!fx.tokens.delete_by_plaintext(&second.plaintext).await.unwrap());

    assert!(fx.tokens.list_for_user(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_for_user_leaves_others() {
    let fx = fixture();
    let john = user(&fx, "john@doe.com").await;
    let jane = user(&fx, "jane@doe.com").await;

    for owner in [john, john, jane] {
        let generated = fx.generator.generate(owner, Duration::from_secs(60)).unwrap();
        fx.tokens.insert(&generated).await.unwrap();
    }

    assert_eq!(fx.tokens.delete_for_user(john).await.unwrap(), 2);
    assert_eq!(fx.tokens.delete_for_user(john).await.unwrap(), 0);
    assert_eq!(fx.tokens.list_for_user(jane).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_purge_expired() {
    let fx = fixture();
    let user_id = user(&fx, "john@doe.com").await;

    let short = fx.generator.generate(user_id, Duration::from_secs(60)).unwrap();
    let long = fx.generator.generate(user_id, Duration::from_secs(3600)).unwrap();
    fx.tokens.insert(&short).await.unwrap();
    let kept = fx.tokens.insert(&long).await.unwrap();

    fx.clock.advance(chrono::Duration::seconds(60));
    assert_eq!(fx.tokens.purge_expired(fx.clock.now()).await.unwrap(), 1);

    let remaining = fx.tokens.list_for_user(user_id).await.unwrap();
    assert_eq!(remaining, vec![kept]);
}

#[tokio::test]
async fn test_user_delete_cascades_to_tokens() {
    let fx = fixture();
    let user_id = user(&fx, "john@doe.com").await;
    let generated = fx.generator.generate(user_id, Duration::from_secs(60)).unwrap();
    fx.tokens.insert(&generated).await.unwrap();

    fx.credentials.delete(user_id).await.unwrap();

    assert!(matches!(
        fx.tokens.find_by_plaintext(&generated.plaintext).await,
        Err(RustyKeysError::NotFound(_))
    ));
}
