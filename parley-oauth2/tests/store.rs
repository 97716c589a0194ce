use chrono::{Duration, Utc};
use parley_oauth2::{
    AuthorizationCode, InMemoryStore, ResponseType, Scopes, Store, StoreError, Token,
};
use uuid::Uuid;

fn code(value: &str, ttl: Duration) -> AuthorizationCode {
    let now = Utc::now();
    AuthorizationCode {
        code: value.into(),
        client_id: "web".into(),
        user_id: Uuid::new_v4(),
        scopes: Scopes::new(),
        redirect_uri: None,
        response_type: ResponseType::parse("code").unwrap(),
        code_challenge: None,
        nonce: None,
        issued_at: now,
        expires_at: now + ttl,
    }
}

fn token(access: &str, expires_in: Duration, refresh: Option<(&str, Duration)>) -> Token {
    let now = Utc::now();
    Token {
        id: Uuid::new_v4(),
        client_id: "web".into(),
        user_id: None,
        access_token: access.into(),
        refresh_token: refresh.map(|(value, _)| value.into()),
        scopes: Scopes::new(),
        issued_at: now,
        expires_at: now + expires_in,
        refresh_expires_at: refresh.map(|(_, ttl)| now + ttl),
    }
}

#[tokio::test]
async fn saving_a_code_evicts_expired_ones() {
    let store = InMemoryStore::new();
    store
        .save_authorization_code(code("stale", -Duration::seconds(1)))
        .await
        .unwrap();
    store
        .save_authorization_code(code("live", Duration::seconds(60)))
        .await
        .unwrap();
    store
        .save_authorization_code(code("fresh", Duration::seconds(60)))
        .await
        .unwrap();

    assert_eq!(
        store.consume_authorization_code("stale").await.unwrap_err(),
        StoreError::NotFound
    );
    assert!(store.consume_authorization_code("live").await.is_ok());
}

#[tokio::test]
async fn saving_a_token_evicts_rows_nothing_can_redeem() {
    let store = InMemoryStore::new();
    let hour = Duration::hours(1);
    let gone = -Duration::seconds(1);

    // Access expired, no refresh token.
    store.save_token(token("a1", gone, None)).await.unwrap();
    // Access and refresh both expired.
    store.save_token(token("a2", gone, Some(("r2", gone)))).await.unwrap();
    // Access expired, refresh still good.
    store.save_token(token("a3", gone, Some(("r3", hour)))).await.unwrap();
    // Access live.
    store.save_token(token("a4", hour, None)).await.unwrap();

    store.save_token(token("a5", hour, None)).await.unwrap();

    assert_eq!(store.token_count(), 3);
    assert_eq!(
        store.get_token_by_access("a1").await.unwrap_err(),
        StoreError::NotFound
    );
    assert_eq!(
        store.get_token_by_refresh("r2").await.unwrap_err(),
        StoreError::NotFound
    );
    assert!(store.get_token_by_refresh("r3").await.is_ok());
    assert!(store.get_token_by_access("a4").await.is_ok());
}
