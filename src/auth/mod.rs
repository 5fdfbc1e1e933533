pub mod session;

pub use session::{PortalSession, SessionStore};

/// Constant-time comparison for shared secrets.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    use subtle::ConstantTimeEq;
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
