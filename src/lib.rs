//! # Hush (shared secrets board)
//!
//! `hush` is a small web service that grants access to a shared "secrets"
//! board once a visitor has authenticated. Three credential paths are
//! supported: a local username/password pair, Google `OAuth2`, and Facebook
//! OAuth.
//!
//! ## Identity model
//!
//! - **Local accounts** store an Argon2id hash of the password; the plaintext
//!   is never persisted or logged.
//! - **OAuth accounts** are reconciled through find-or-create: the first
//!   callback carrying a previously-unseen provider id creates a user record
//!   holding only that id. A visitor signing in through two different
//!   providers ends up with two disjoint accounts; there is no linking UI.
//! - **Sessions** are server-side rows keyed by the digest of an opaque
//!   cookie token. The session stores the user id and nothing else.
//!
//! ## Storage
//!
//! Components receive their storage as injected trait objects
//! ([`store::UserStore`], [`store::SessionStore`], [`store::SecretStore`]).
//! Production wiring uses PostgreSQL; tests run against the in-memory
//! implementations.

pub mod auth;
pub mod cli;
pub mod hush;
pub mod store;
