// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use marketo_sync::config::Config;
use marketo_sync::models::{TokenData, UserData};
use marketo_sync::routes::create_router;
use marketo_sync::services::testing::{InMemoryClinicDirectory, InMemoryCrm, InMemoryIdentity};
use marketo_sync::AppState;
use std::sync::Arc;

/// Session token accepted as a server token by [`TestApp::identity`].
#[allow(dead_code)]
pub const SERVER_TOKEN: &str = "server-session-token";

/// Session token of an ordinary user.
#[allow(dead_code)]
pub const USER_TOKEN: &str = "user-session-token";

/// Application wired to in-memory collaborators.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub crm: Arc<InMemoryCrm>,
    pub identity: Arc<InMemoryIdentity>,
    pub clinics: Arc<InMemoryClinicDirectory>,
}

/// Create a test app with in-memory dependencies and the two test tokens.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let crm = Arc::new(InMemoryCrm::new());
    let identity = Arc::new(InMemoryIdentity::new());
    let clinics = Arc::new(InMemoryClinicDirectory::new());

    identity.insert_token(
        SERVER_TOKEN,
        TokenData {
            user_id: "marketo-service".to_string(),
            is_server: true,
        },
    );
    identity.insert_token(
        USER_TOKEN,
        TokenData {
            user_id: "someone".to_string(),
            is_server: false,
        },
    );

    let state = Arc::new(AppState::new(
        &Config::test_default(),
        identity.clone(),
        clinics.clone(),
        crm.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        crm,
        identity,
        clinics,
    }
}

/// A verified user with accepted terms.
#[allow(dead_code)]
pub fn verified_user(user_id: &str, email: &str) -> UserData {
    UserData {
        user_id: user_id.to_string(),
        username: email.to_string(),
        emails: vec![email.to_string()],
        roles: vec![],
        terms_accepted: "2024-01-01T00:00:00Z".to_string(),
        email_verified: true,
        password_exists: true,
    }
}
