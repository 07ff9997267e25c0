//! Registration, the two-factor login flow, and logout.

#![allow(clippy::unwrap_used)]

mod common;

use tekmart_core::{ProductId, Role};
use tekmart_store::auth::{AuthError, AuthSession, AuthState};
use tekmart_store::models::CartScope;

use common::{FailingSender, RecordingSender, empty_store, register_user, seeded_store};

#[tokio::test]
async fn registration_creates_a_signed_in_user() {
    let store = empty_store().await;
    let mut session = AuthSession::new();

    let user = store
        .auth()
        .register(&mut session, "a@x.com", "pw123456")
        .await
        .unwrap();

    assert_eq!(user.email.as_str(), "a@x.com");
    assert_eq!(user.role, Role::User);
    assert!(session.is_authenticated());
    assert_eq!(session.user().unwrap().id, user.id);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let store = empty_store().await;
    let mut session = AuthSession::new();
    let auth = store.auth();

    auth.register(&mut session, "a@x.com", "pw123456").await.unwrap();

    let mut second = AuthSession::new();
    let result = auth.register(&mut second, "a@x.com", "pw654321").await;
    assert!(matches!(result, Err(AuthError::UserAlreadyExists)));
    assert!(!second.is_authenticated());

    // normalization: the same address in different case is still a duplicate
    let result = auth.register(&mut second, "A@X.COM", "pw654321").await;
    assert!(matches!(result, Err(AuthError::UserAlreadyExists)));
}

#[tokio::test]
async fn weak_passwords_are_rejected() {
    let store = empty_store().await;
    let mut session = AuthSession::new();

    let result = store.auth().register(&mut session, "a@x.com", "short").await;
    assert!(matches!(result, Err(AuthError::WeakPassword(_))));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let store = empty_store().await;
    let auth = store.auth();
    let mut session = AuthSession::new();
    auth.register(&mut session, "a@x.com", "pw123456").await.unwrap();

    let sender = RecordingSender::new();

    let mut s1 = AuthSession::new();
    let wrong_password = auth
        .login(&mut s1, "a@x.com", "not-the-password", &sender)
        .await
        .unwrap_err();

    let mut s2 = AuthSession::new();
    let unknown_email = auth
        .login(&mut s2, "nobody@x.com", "pw123456", &sender)
        .await
        .unwrap_err();

    assert!(matches!(wrong_password, AuthError::InvalidCredentials));
    assert!(matches!(unknown_email, AuthError::InvalidCredentials));
    // identical user-facing message, so callers cannot leak which was wrong
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    assert_eq!(sender.deliveries(), 0);
}

#[tokio::test]
async fn full_two_factor_login_flow() {
    let store = empty_store().await;
    let auth = store.auth();

    let mut session = AuthSession::new();
    let registered = auth
        .register(&mut session, "a@x.com", "pw123456")
        .await
        .unwrap();
    auth.logout(&mut session).await.unwrap();
    assert_eq!(*session.state(), AuthState::LoggedOut);

    let sender = RecordingSender::new();
    auth.login(&mut session, "A@X.com", "pw123456", &sender)
        .await
        .unwrap();

    assert!(matches!(
        session.state(),
        AuthState::AwaitingSecurityCode { .. }
    ));
    assert!(!session.is_authenticated());

    let code = sender.last_code().expect("code was delivered out-of-band");
    assert_eq!(code.len(), 4);

    let user = auth.verify_security_code(&mut session, &code).await.unwrap();
    assert_eq!(user.id, registered.id);
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn wrong_code_is_rejected_and_attempts_are_capped() {
    let store = empty_store().await;
    let auth = store.auth();

    let mut session = AuthSession::new();
    auth.register(&mut session, "a@x.com", "pw123456").await.unwrap();
    auth.logout(&mut session).await.unwrap();

    let sender = RecordingSender::new();
    auth.login(&mut session, "a@x.com", "pw123456", &sender)
        .await
        .unwrap();
    let code = sender.last_code().unwrap();
    // a code that cannot match any generated one
    let wrong = "0000";
    assert_ne!(wrong, code);

    for _ in 0..4 {
        let err = auth
            .verify_security_code(&mut session, wrong)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    let err = auth
        .verify_security_code(&mut session, wrong)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TooManyAttempts));
    assert_eq!(*session.state(), AuthState::LoggedOut);

    // the challenge is void; even the right code no longer works
    let err = auth
        .verify_security_code(&mut session, &code)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NoPendingChallenge));
}

#[tokio::test]
async fn relogin_replaces_the_pending_code() {
    let store = empty_store().await;
    let auth = store.auth();

    let mut session = AuthSession::new();
    auth.register(&mut session, "a@x.com", "pw123456").await.unwrap();
    auth.logout(&mut session).await.unwrap();

    let sender = RecordingSender::new();
    auth.login(&mut session, "a@x.com", "pw123456", &sender).await.unwrap();
    let first = sender.last_code().unwrap();

    auth.login(&mut session, "a@x.com", "pw123456", &sender).await.unwrap();
    let second = sender.last_code().unwrap();
    assert_eq!(sender.deliveries(), 2);

    if first != second {
        let err = auth
            .verify_security_code(&mut session, &first)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    auth.verify_security_code(&mut session, &second).await.unwrap();
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn verify_without_challenge_is_rejected() {
    let store = empty_store().await;
    let mut session = AuthSession::new();

    let err = store
        .auth()
        .verify_security_code(&mut session, "1234")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NoPendingChallenge));
}

#[tokio::test]
async fn failed_delivery_leaves_the_session_logged_out() {
    let store = empty_store().await;
    let auth = store.auth();

    let mut session = AuthSession::new();
    auth.register(&mut session, "a@x.com", "pw123456").await.unwrap();
    auth.logout(&mut session).await.unwrap();

    let err = auth
        .login(&mut session, "a@x.com", "pw123456", &FailingSender)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Delivery(_)));
    assert_eq!(*session.state(), AuthState::LoggedOut);
}

#[tokio::test]
async fn logout_clears_the_user_cart_but_not_the_guest_cart() {
    let store = seeded_store().await;
    let (mut session, user) = register_user(&store, "cart@x.com").await;

    let cart = store.cart();
    let mine = CartScope::User(user.id.clone());
    cart.add(&mine, &ProductId::new("prod_1"), 2).await.unwrap();
    cart.add(&CartScope::Guest, &ProductId::new("prod_2"), 1)
        .await
        .unwrap();

    store.auth().logout(&mut session).await.unwrap();

    assert_eq!(*session.state(), AuthState::LoggedOut);
    assert!(cart.lines(&mine).await.unwrap().is_empty());
    assert_eq!(cart.lines(&CartScope::Guest).await.unwrap().len(), 1);
}

#[tokio::test]
async fn logout_voids_a_pending_challenge() {
    let store = empty_store().await;
    let auth = store.auth();

    let mut session = AuthSession::new();
    auth.register(&mut session, "a@x.com", "pw123456").await.unwrap();
    auth.logout(&mut session).await.unwrap();

    let sender = RecordingSender::new();
    auth.login(&mut session, "a@x.com", "pw123456", &sender).await.unwrap();
    let code = sender.last_code().unwrap();

    auth.logout(&mut session).await.unwrap();

    // a new session cannot ride on the abandoned challenge
    let mut fresh = AuthSession::new();
    let err = auth
        .verify_security_code(&mut fresh, &code)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NoPendingChallenge));
}
