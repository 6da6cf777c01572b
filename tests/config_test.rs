use std::env;
use std::time::Duration;

use rusty_keys::config::AuthConfig;
use rusty_keys::error::RustyKeysError;

const VARS: [&str; 5] = [
    "RUSTY_KEYS_PASSWORD_HASH_COST",
    "RUSTY_KEYS_PASSWORD_HASH_MEMORY_KIB",
    "RUSTY_KEYS_TOKEN_LENGTH",
    "RUSTY_KEYS_DEFAULT_TTL_SECS",
    "RUSTY_KEYS_AUTH_FLOOR_MS",
];

// Everything touching the process environment lives in this one test
#[test]
fn test_from_env() {
    for var in VARS {
        env::remove_var(var);
    }
    assert_eq!(AuthConfig::from_env().unwrap(), AuthConfig::default());

    env::set_var("RUSTY_KEYS_PASSWORD_HASH_COST", "4");
    env::set_var("RUSTY_KEYS_TOKEN_LENGTH", "32");
    env::set_var("RUSTY_KEYS_DEFAULT_TTL_SECS", "900");
    env::set_var("RUSTY_KEYS_AUTH_FLOOR_MS", " 0 ");
    let config = AuthConfig::from_env().unwrap();
    assert_eq!(config.password_hash_cost, 4);
    assert_eq!(config.token_length, 32);
    assert_eq!(config.default_ttl, Duration::from_secs(900));
    assert_eq!(config.auth_floor, Duration::ZERO);

    env::set_var("RUSTY_KEYS_TOKEN_LENGTH", "twenty");
    assert!(matches!(
        AuthConfig::from_env(),
        Err(RustyKeysError::ConfigError(_))
    ));

    env::set_var("RUSTY_KEYS_TOKEN_LENGTH", "8");
    assert!(matches!(
        AuthConfig::from_env(),
        Err(RustyKeysError::ConfigError(_))
    ));

    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
fn test_validation_limits() {
    let invalid = [
        AuthConfig {
            password_hash_cost: 0,
            ..AuthConfig::default()
        },
        AuthConfig {
            password_hash_cost: 11,
            ..AuthConfig::default()
        },
        AuthConfig {
            password_hash_memory_kib: 4,
            ..AuthConfig::default()
        },
        AuthConfig {
            token_length: 15,
            ..AuthConfig::default()
        },
        AuthConfig {
            token_length: 129,
            ..AuthConfig::default()
        },
        AuthConfig {
            default_ttl: Duration::ZERO,
            ..AuthConfig::default()
        },
    ];

    for config in invalid {
        assert!(
            matches!(config.validate(), Err(RustyKeysError::ConfigError(_))),
            "{:?}",
            config
        );
    }
}
