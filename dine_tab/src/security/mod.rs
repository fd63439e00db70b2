//! Tab capability tokens.
//!
//! A tab token is a bearer capability: whoever holds it may join the tab, read
//! its detail and start or abandon a payment. Tokens are generated once when
//! the tab opens and never reissued.

pub mod token;

pub use token::{RepositoryTokenValidator, TOKEN_BYTES, TabToken, TokenValidator};
