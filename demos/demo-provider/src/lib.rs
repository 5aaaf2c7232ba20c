//! A runnable client-credentials provider built on `oidc-op`.

pub mod keys;
pub mod provider;
pub mod storage;
