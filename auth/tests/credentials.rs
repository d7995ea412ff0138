//! Both credential kinds built from one configuration.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use chrono::{Duration, Utc};
use proptest::prelude::*;
use shuttle_auth::{AuthConfig, AuthError, Caller, QrCodec, Role};
use shuttle_core::UserId;
use shuttle_testing::properties;

fn config() -> AuthConfig {
    AuthConfig::new(
        QrCodec::generate_base64_key(),
        "integration-secret-that-is-long-enough".to_string(),
    )
    .with_bearer_ttl(Duration::minutes(5))
}

fn rider() -> Caller {
    Caller {
        user_id: UserId(1),
        email: "a@example.com".to_string(),
        name: "Alice Kim".to_string(),
        role: Role::User,
    }
}

#[test]
fn test_credentials_are_not_interchangeable() {
    let config = config();
    let codec = config.qr_codec().unwrap();
    let bearer = config.bearer_validator().unwrap();

    let qr = codec.encode(UserId(1), "a@example.com").unwrap();
    let token = bearer.issue(&rider(), Utc::now()).unwrap();

    assert!(matches!(bearer.validate(&qr), Err(AuthError::Unauthorized(_))));
    assert_eq!(codec.decode(&token), Err(AuthError::InvalidCredential));
}

#[test]
fn test_bearer_carries_role() {
    let bearer = config().bearer_validator().unwrap();
    let operator = Caller {
        role: Role::Admin,
        ..rider()
    };

    let caller = bearer
        .validate(&bearer.issue(&operator, Utc::now()).unwrap())
        .unwrap();

    assert!(caller.is_admin());
    assert!(caller.require_admin().is_ok());
    assert!(rider().require_admin().is_err());
}

#[test]
fn test_restart_with_same_key_keeps_credentials() {
    let config = config();
    let token = config
        .qr_codec()
        .unwrap()
        .encode(UserId(3), "c@example.com")
        .unwrap();

    let restarted = AuthConfig::new(config.qr_secret_key.clone(), config.jwt_secret.clone());
    let payload = restarted.qr_codec().unwrap().decode(&token).unwrap();

    assert_eq!(payload.user_id, UserId(3));
    assert_eq!(payload.email, "c@example.com");
}

proptest! {
    #[test]
    fn prop_qr_decodes_to_what_was_sealed(
        user_id in properties::user_id(),
        email in properties::email(),
    ) {
        let codec = QrCodec::new(&[9u8; 32]).unwrap();
        let payload = codec.decode(&codec.encode(user_id, &email).unwrap()).unwrap();
        prop_assert_eq!(payload.user_id, user_id);
        prop_assert_eq!(payload.email, email);
    }
}
