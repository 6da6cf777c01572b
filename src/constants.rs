// Password hashing defaults (Argon2id, OWASP baseline)
pub const DEFAULT_PASSWORD_HASH_COST: u32 = 3;
pub const DEFAULT_PASSWORD_HASH_MEMORY_KIB: u32 = 19_456;
pub const MAX_PASSWORD_HASH_COST: u32 = 10;

// Bearer token defaults
pub const DEFAULT_TOKEN_LENGTH: usize = 26;
pub const MIN_TOKEN_LENGTH: usize = 16;
pub const MAX_TOKEN_LENGTH: usize = 128;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;
pub const BEARER_SCHEME: &str = "Bearer";

// Crockford-style alphabet: no 0/O, no 1/I
pub const TOKEN_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

// Minimum wall time for an authentication or login response
pub const DEFAULT_AUTH_FLOOR_MS: u64 = 100;
