//! Authentication and authorization
//!
//! Request flow: [`Credential`] extraction, [`TokenAuthority`] verification
//! for session tokens, [`IdentityResolver`] lookup, then the [`authz`]
//! predicates.

pub mod authz;
pub mod credential;
pub mod identity;
pub mod password;
pub mod token;

pub use credential::{API_KEY_HEADER, Credential};
pub use identity::IdentityResolver;
pub use token::{Claims, TokenAuthority, TokenError, TokenPair, TokenType};
