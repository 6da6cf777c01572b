//! Credentials, bearer tokens and the validator that ties them together

pub mod credentials;
pub mod password;
pub mod token;
pub mod tokens;
pub mod user;
pub mod validator;

// Re-export main components
pub use credentials::CredentialStore;
pub use password::PasswordHasher;
pub use token::{
    extract_bearer_token, GeneratedToken, IssuedToken, Token, TokenDigest, TokenGenerator,
    TokenMetadata,
};
pub use tokens::TokenStore;
pub use user::{Identity, NewUser, User, UserUpdate};
pub use validator::{AuthOutcome, AuthValidator, PublicOutcome, RejectionKind};
