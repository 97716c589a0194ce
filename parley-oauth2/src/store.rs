use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::client::Client;
use crate::model::{AuthorizationCode, Token, User};

/// Boxed future returned by [`Store`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors reported by a [`Store`] backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record does not exist or was already consumed.
    NotFound,
    /// A record with the same key already exists.
    Conflict,
    /// The backend did not answer in time.
    Timeout,
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "record not found"),
            StoreError::Conflict => write!(f, "record already exists"),
            StoreError::Timeout => write!(f, "store timed out"),
            StoreError::Backend(msg) => write!(f, "store backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence for clients, users, authorization codes and tokens.
///
/// Implementations must make [`consume_authorization_code`](Store::consume_authorization_code)
/// and [`consume_refresh_token`](Store::consume_refresh_token) at-most-once:
/// among concurrent callers for the same value exactly one gets the record,
/// every other caller gets [`StoreError::NotFound`].
pub trait Store: Send + Sync + 'static {
    fn get_client<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Client>;

    fn save_authorization_code(&self, code: AuthorizationCode) -> StoreFuture<'_, ()>;

    /// Atomically remove and return a code.
    fn consume_authorization_code<'a>(&'a self, code: &'a str)
        -> StoreFuture<'a, AuthorizationCode>;

    fn save_token(&self, token: Token) -> StoreFuture<'_, ()>;

    fn get_token_by_access<'a>(&'a self, access_token: &'a str) -> StoreFuture<'a, Token>;

    fn get_token_by_refresh<'a>(&'a self, refresh_token: &'a str) -> StoreFuture<'a, Token>;

    /// Atomically remove and return the token row owning this refresh token.
    fn consume_refresh_token<'a>(&'a self, refresh_token: &'a str) -> StoreFuture<'a, Token>;

    /// Delete a token row. Revoking an unknown id is `NotFound`.
    fn revoke_token(&self, id: Uuid) -> StoreFuture<'_, ()>;

    fn get_user(&self, id: Uuid) -> StoreFuture<'_, User>;

    fn get_user_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, User>;
}

/// In-memory store for development and testing.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    clients: Arc<DashMap<String, Client>>,
    users: Arc<DashMap<Uuid, User>>,
    codes: Arc<DashMap<String, AuthorizationCode>>,
    tokens: Arc<DashMap<Uuid, Token>>,
    /// access token value -> token id
    by_access: Arc<DashMap<String, Uuid>>,
    /// refresh token value -> token id
    by_refresh: Arc<DashMap<String, Uuid>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(self, client: Client) -> Self {
        self.clients.insert(client.id.clone(), client);
        self
    }

    pub fn with_user(self, user: User) -> Self {
        self.users.insert(user.id, user);
        self
    }

    pub fn put_client(&self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }

    /// Replace a user record, e.g. to change its status in tests.
    pub fn put_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Number of live token rows.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn remove_token_row(&self, id: Uuid) -> Option<Token> {
        let (_, token) = self.tokens.remove(&id)?;
        self.by_access.remove(&token.access_token);
        if let Some(refresh) = &token.refresh_token {
            self.by_refresh.remove(refresh);
        }
        Some(token)
    }

    /// Drop rows nothing can redeem any more: a token whose access token has
    /// expired and whose refresh token is absent or expired too.
    fn sweep_tokens(&self, now: DateTime<Utc>) {
        let dead: Vec<Uuid> = self
            .tokens
            .iter()
            .filter(|t| {
                t.is_expired(now) && (t.refresh_token.is_none() || t.is_refresh_expired(now))
            })
            .map(|t| t.id)
            .collect();
        for id in dead {
            self.remove_token_row(id);
        }
    }

    fn lookup(&self, index: &DashMap<String, Uuid>, value: &str) -> Result<Token, StoreError> {
        let id = *index.get(value).ok_or(StoreError::NotFound)?;
        self.tokens
            .get(&id)
            .map(|t| t.value().clone())
            .ok_or(StoreError::NotFound)
    }
}

fn ready<'a, T: Send + 'a>(result: Result<T, StoreError>) -> StoreFuture<'a, T> {
    Box::pin(async move { result })
}

impl Store for InMemoryStore {
    fn get_client<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Client> {
        ready(
            self.clients
                .get(id)
                .map(|c| c.value().clone())
                .ok_or(StoreError::NotFound),
        )
    }

    fn save_authorization_code(&self, code: AuthorizationCode) -> StoreFuture<'_, ()> {
        let now = Utc::now();
        self.codes.retain(|_, c| !c.is_expired(now));
        let result = match self.codes.entry(code.code.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(code);
                Ok(())
            }
        };
        ready(result)
    }

    fn consume_authorization_code<'a>(
        &'a self,
        code: &'a str,
    ) -> StoreFuture<'a, AuthorizationCode> {
        ready(
            self.codes
                .remove(code)
                .map(|(_, c)| c)
                .ok_or(StoreError::NotFound),
        )
    }

    fn save_token(&self, token: Token) -> StoreFuture<'_, ()> {
        self.sweep_tokens(Utc::now());
        if self.by_access.contains_key(&token.access_token) {
            return ready(Err(StoreError::Conflict));
        }
        self.by_access.insert(token.access_token.clone(), token.id);
        if let Some(refresh) = &token.refresh_token {
            self.by_refresh.insert(refresh.clone(), token.id);
        }
        self.tokens.insert(token.id, token);
        ready(Ok(()))
    }

    fn get_token_by_access<'a>(&'a self, access_token: &'a str) -> StoreFuture<'a, Token> {
        ready(self.lookup(&self.by_access, access_token))
    }

    fn get_token_by_refresh<'a>(&'a self, refresh_token: &'a str) -> StoreFuture<'a, Token> {
        ready(self.lookup(&self.by_refresh, refresh_token))
    }

    fn consume_refresh_token<'a>(&'a self, refresh_token: &'a str) -> StoreFuture<'a, Token> {
        // Removing the index entry is the linearization point.
        let result = self
            .by_refresh
            .remove(refresh_token)
            .and_then(|(_, id)| self.remove_token_row(id))
            .ok_or(StoreError::NotFound);
        ready(result)
    }

    fn revoke_token(&self, id: Uuid) -> StoreFuture<'_, ()> {
        ready(
            self.remove_token_row(id)
                .map(|_| ())
                .ok_or(StoreError::NotFound),
        )
    }

    fn get_user(&self, id: Uuid) -> StoreFuture<'_, User> {
        ready(
            self.users
                .get(&id)
                .map(|u| u.value().clone())
                .ok_or(StoreError::NotFound),
        )
    }

    fn get_user_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, User> {
        ready(
            self.users
                .iter()
                .find(|u| u.name == name)
                .map(|u| u.value().clone())
                .ok_or(StoreError::NotFound),
        )
    }
}
