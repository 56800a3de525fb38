//! Durable session state for the buyer/seller and admin surfaces.
//!
//! Each store persists as a single JSON value, so the token and the user
//! record are written and cleared together and can never be observed
//! half-updated. A stored value that decodes but is missing either half is
//! treated as corrupted and cleared rather than trusted.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::capabilities::{decode_stored, KeyNamespace, KvKey};
use crate::model::{AdminSession, Session, Token, UserId, UserProfile};

/// Outcome of restoring a store from durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing stored.
    Missing,
    /// A complete session was restored.
    Restored,
    /// Something was stored but it was incomplete or undecodable; the
    /// caller must also delete the stored value.
    Corrupted,
}

fn is_absent_literal(bytes: &[u8]) -> bool {
    matches!(
        std::str::from_utf8(bytes).map(str::trim),
        Ok("") | Ok("undefined") | Ok("null")
    )
}

fn restore<T: DeserializeOwned>(
    stored: Option<&[u8]>,
    is_complete: impl Fn(&T) -> bool,
) -> (Option<T>, RestoreOutcome) {
    let Some(bytes) = stored else {
        return (None, RestoreOutcome::Missing);
    };
    if is_absent_literal(bytes) {
        return (None, RestoreOutcome::Missing);
    }
    match decode_stored::<T>(bytes) {
        Some(value) if is_complete(&value) => (Some(value), RestoreOutcome::Restored),
        Some(_) | None => (None, RestoreOutcome::Corrupted),
    }
}

#[derive(Default)]
pub struct SessionStore {
    current: Option<Session>,
    restored: bool,
}

impl SessionStore {
    #[must_use]
    pub fn storage_key() -> KvKey {
        KvKey::from_static(KeyNamespace::Session, "current")
    }

    #[must_use]
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// True iff both a token and a user record are present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.as_ref().is_some_and(Session::is_complete)
    }

    /// Whether the initial restore from durable storage has completed.
    #[must_use]
    pub const fn is_restored(&self) -> bool {
        self.restored
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&Token> {
        self.current.as_ref().map(|s| &s.access_token)
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserProfile> {
        self.current.as_ref().map(|s| &s.user)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.current.as_ref().map(|s| &s.user.id)
    }

    /// Accept a freshly verified session. The caller persists the returned
    /// encoding under [`Self::storage_key`].
    pub fn accept(&mut self, session: Session) {
        self.restored = true;
        self.current = Some(session);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn restore_from(&mut self, stored: Option<&[u8]>) -> RestoreOutcome {
        self.restored = true;
        let (session, outcome) = restore::<Session>(stored, Session::is_complete);
        self.current = session;
        outcome
    }
}

#[derive(Default)]
pub struct AdminStore {
    current: Option<AdminSession>,
    restored: bool,
}

impl AdminStore {
    #[must_use]
    pub fn storage_key() -> KvKey {
        KvKey::from_static(KeyNamespace::AdminSession, "current")
    }

    #[must_use]
    pub fn current(&self) -> Option<&AdminSession> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.as_ref().is_some_and(AdminSession::is_complete)
    }

    #[must_use]
    pub const fn is_restored(&self) -> bool {
        self.restored
    }

    #[must_use]
    pub fn token(&self) -> Option<&Token> {
        self.current.as_ref().map(|s| &s.token)
    }

    pub fn accept(&mut self, session: AdminSession) {
        self.restored = true;
        self.current = Some(session);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn restore_from(&mut self, stored: Option<&[u8]>) -> RestoreOutcome {
        self.restored = true;
        let (session, outcome) = restore::<AdminSession>(stored, AdminSession::is_complete);
        self.current = session;
        outcome
    }
}

/// Encode a session value for storage.
///
/// # Errors
///
/// Propagates the storage encoding failure (oversized or unserializable).
pub fn encode_session<T: Serialize>(session: &T) -> Result<Vec<u8>, crate::AppError> {
    crate::capabilities::encode_stored(session).map_err(|e| {
        crate::AppError::new(crate::ErrorKind::Storage, "Could not save the session")
            .with_internal(e.to_string())
    })
}

/// Per-user cache key, so one user's cached data is never served to another
/// account on the same device.
#[must_use]
pub fn user_cache_key(user_id: &UserId, name: &str) -> Option<KvKey> {
    let digest = blake3::hash(user_id.as_str().as_bytes());
    KvKey::new(
        KeyNamespace::Cache,
        format!("{}_{}", name, &digest.to_hex().as_str()[..16]),
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Token;

    fn complete_session() -> Session {
        Session {
            user: UserProfile {
                id: UserId::new("user_123"),
                phone_number: Some("+919999999999".into()),
                email: None,
                name: Some("Ravi".into()),
                city: None,
                is_verified: true,
            },
            access_token: Token::new("access"),
            refresh_token: Token::new("refresh"),
        }
    }

    #[test]
    fn restore_of_missing_value_leaves_store_empty() {
        let mut store = SessionStore::default();
        assert_eq!(store.restore_from(None), RestoreOutcome::Missing);
        assert!(!store.is_authenticated());
        assert!(store.is_restored());
    }

    #[test]
    fn restore_roundtrips_a_complete_session() {
        let bytes = encode_session(&complete_session()).unwrap();
        let mut store = SessionStore::default();
        assert_eq!(store.restore_from(Some(&bytes)), RestoreOutcome::Restored);
        assert!(store.is_authenticated());
        assert_eq!(store.user_id().unwrap().as_str(), "user_123");
    }

    #[test]
    fn token_without_user_is_corrupted_and_cleared() {
        let mut session = complete_session();
        session.user.id = UserId::new("");
        let bytes = encode_session(&session).unwrap();

        let mut store = SessionStore::default();
        assert_eq!(store.restore_from(Some(&bytes)), RestoreOutcome::Corrupted);
        assert!(!store.is_authenticated());
        assert!(store.current().is_none());
    }

    #[test]
    fn user_without_token_is_corrupted_and_cleared() {
        let mut session = complete_session();
        session.access_token = Token::new("");
        let bytes = encode_session(&session).unwrap();

        let mut store = SessionStore::default();
        assert_eq!(store.restore_from(Some(&bytes)), RestoreOutcome::Corrupted);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn stored_undefined_literal_is_missing_not_corrupted() {
        // Web shells have been seen persisting the literal string
        // "undefined"; it must behave like an absent value.
        let mut store = SessionStore::default();
        assert_eq!(
            store.restore_from(Some(b"undefined")),
            RestoreOutcome::Missing
        );
        assert_eq!(store.restore_from(Some(b"null")), RestoreOutcome::Missing);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn garbage_json_is_corrupted_not_a_crash() {
        let mut store = SessionStore::default();
        assert_eq!(
            store.restore_from(Some(b"{\"user\": ")),
            RestoreOutcome::Corrupted
        );
        assert!(!store.is_authenticated());
    }

    #[test]
    fn clear_drops_token_and_user_together() {
        let mut store = SessionStore::default();
        store.accept(complete_session());
        assert!(store.is_authenticated());
        store.clear();
        assert!(store.current().is_none());
        assert!(store.access_token().is_none());
    }

    #[test]
    fn cache_keys_differ_per_user() {
        let a = user_cache_key(&UserId::new("user_a"), "favorites").unwrap();
        let b = user_cache_key(&UserId::new("user_b"), "favorites").unwrap();
        assert_ne!(a.raw(), b.raw());
    }
}
