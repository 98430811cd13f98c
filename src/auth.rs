use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reqwest::Method;
use tracing::{info, warn};

use crate::error::MechaLungError;
use crate::models::{Doctor, LoginRequest, LoginResponse};
use crate::transport::{encode_body, ApiClient, HttpBackend};

const LOGIN_PATH: &str = "/api/doctors/login";
const WHOAMI_PATH: &str = "/api/doctors/me";

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Anonymous,
    Authenticated(Doctor),
}

/// Login, logout and startup revalidation.
///
/// This is the only component that writes the session token.
pub struct AuthController<B> {
    api: Rc<ApiClient<B>>,
    state: RefCell<AuthState>,
    signing_in: Cell<bool>,
    /// Bumped by every logout; replies to requests sent before it are dropped.
    epoch: Cell<u64>,
}

struct SigningIn<'a>(&'a Cell<bool>);

impl Drop for SigningIn<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<B: HttpBackend> AuthController<B> {
    pub fn new(api: Rc<ApiClient<B>>) -> Self {
        Self {
            api,
            state: RefCell::new(AuthState::Anonymous),
            signing_in: Cell::new(false),
            epoch: Cell::new(0),
        }
    }

    /// Current state, reconciled against the session store: a principal is
    /// only reported while a token is actually stored.
    pub fn state(&self) -> AuthState {
        if !self.api.session().has_token() {
            let mut state = self.state.borrow_mut();
            if matches!(*state, AuthState::Authenticated(_)) {
                warn!("Session token disappeared; treating session as signed out");
                *state = AuthState::Anonymous;
            }
        }
        self.state.borrow().clone()
    }

    pub fn principal(&self) -> Option<Doctor> {
        match self.state() {
            AuthState::Authenticated(doctor) => Some(doctor),
            AuthState::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal().is_some()
    }

    pub fn is_signing_in(&self) -> bool {
        self.signing_in.get()
    }

    /// Exchange credentials for a token. On failure the state stays anonymous
    /// and the error carries the server's detail text.
    pub async fn login(&self, user_name: &str, password: &str) -> Result<Doctor, MechaLungError> {
        if user_name.trim().is_empty() || password.is_empty() {
            return Err(MechaLungError::InvalidInput(
                "Username and password are required".to_string(),
            ));
        }
        if self.signing_in.replace(true) {
            return Err(MechaLungError::Busy("Signing in".to_string()));
        }
        let _signing_in = SigningIn(&self.signing_in);

        let body = encode_body(&LoginRequest {
            user_name: user_name.trim(),
            password,
        })?;
        let epoch = self.epoch.get();
        let response = self
            .api
            .public_request::<LoginResponse>(Method::POST, LOGIN_PATH, Some(body))
            .await?;

        if self.epoch.get() != epoch {
            warn!("Signed out while signing in; discarding the new token");
            return Err(MechaLungError::SignedOut("Sign-in"));
        }

        let LoginResponse {
            access_token, user, ..
        } = response.data;
        self.api.session().set(&access_token);
        *self.state.borrow_mut() = AuthState::Authenticated(user.clone());
        info!("Signed in as {}", user.user_name);
        Ok(user)
    }

    /// Revalidate a stored token at startup with a "who am I" probe.
    ///
    /// Any failure discards the token; startup never surfaces an error.
    pub async fn restore(&self) -> Option<Doctor> {
        if !self.api.session().has_token() {
            return None;
        }

        let epoch = self.epoch.get();
        let outcome = self
            .api
            .authenticated_request::<Doctor>(Method::GET, WHOAMI_PATH, None)
            .await;
        if self.epoch.get() != epoch {
            warn!("Signed out while revalidating; ignoring the result");
            return None;
        }

        match outcome {
            Ok(response) => {
                let doctor = response.data;
                info!("Restored session for {}", doctor.user_name);
                *self.state.borrow_mut() = AuthState::Authenticated(doctor.clone());
                Some(doctor)
            }
            Err(e) => {
                warn!("Stored session is no longer valid: {}", e);
                self.logout();
                None
            }
        }
    }

    /// Forget the token. Always succeeds.
    pub fn logout(&self) {
        self.epoch.set(self.epoch.get() + 1);
        self.api.session().clear();
        let previous = self.state.replace(AuthState::Anonymous);
        if let AuthState::Authenticated(doctor) = previous {
            info!("Signed out {}", doctor.user_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::session::SessionStore;
    use crate::test_support::{doctor_json, login_json, ScriptedBackend};
    use url::Url;

    fn controller(token: Option<&str>) -> AuthController<ScriptedBackend> {
        let session = Rc::new(SessionStore::in_memory());
        if let Some(t) = token {
            session.set(t);
        }
        let base = Url::parse("http://localhost:8000").unwrap();
        AuthController::new(Rc::new(ApiClient::new(&base, ScriptedBackend::new(), session)))
    }

    fn backend(auth: &AuthController<ScriptedBackend>) -> &ScriptedBackend {
        auth.api.backend()
    }

    #[tokio::test]
    async fn test_login_stores_token_and_principal() {
        let auth = controller(None);
        backend(&auth).respond_json(200, login_json("tok-1", "drsmith"));

        let doctor = auth.login("drsmith", "secret").await.unwrap();

        assert_eq!(doctor.user_name, "drsmith");
        assert_eq!(auth.api.session().get().as_deref(), Some("tok-1"));
        assert_eq!(auth.principal(), Some(doctor));
        let sent = backend(&auth).requests();
        assert_eq!(sent[0].bearer, None);
        assert_eq!(sent[0].body.as_ref().unwrap()["user_name"], "drsmith");
    }

    #[tokio::test]
    async fn test_wrong_password_stays_anonymous() {
        let auth = controller(None);
        backend(&auth).respond_json(401, serde_json::json!({"detail": "Invalid credentials"}));

        let err = auth.login("drsmith", "wrong").await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid credentials");
        assert_eq!(auth.state(), AuthState::Anonymous);
        assert!(!auth.api.session().has_token());
    }

    #[tokio::test]
    async fn test_logout_during_login_discards_token() {
        let auth = controller(None);
        backend(&auth).respond_json(200, login_json("tok-late", "drsmith"));

        let (outcome, ()) = tokio::join!(auth.login("drsmith", "secret"), async {
            auth.logout();
        });

        assert!(matches!(outcome, Err(MechaLungError::SignedOut(_))));
        assert_eq!(auth.state(), AuthState::Anonymous);
        assert!(!auth.api.session().has_token());
        assert!(!auth.is_signing_in());
    }

    #[tokio::test]
    async fn test_logout_during_restore_is_respected() {
        let auth = controller(Some("stored"));
        backend(&auth).respond_json(200, doctor_json("drjones"));

        let (restored, ()) = tokio::join!(auth.restore(), async {
            auth.logout();
        });

        assert_eq!(restored, None);
        assert_eq!(auth.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_login_requires_both_fields() {
        let auth = controller(None);
        let err = auth.login("  ", "pw").await.unwrap_err();
        assert!(matches!(err, MechaLungError::InvalidInput(_)));
        assert_eq!(backend(&auth).request_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_login_is_rejected() {
        let auth = controller(None);
        backend(&auth).respond_json(200, login_json("tok-1", "drsmith"));

        let (first, second) = tokio::join!(auth.login("drsmith", "a"), auth.login("drsmith", "a"));

        assert!(first.is_ok());
        assert!(matches!(second, Err(MechaLungError::Busy(_))));
        assert_eq!(backend(&auth).request_count(), 1);
        assert!(!auth.is_signing_in());
    }

    #[tokio::test]
    async fn test_restore_without_token_makes_no_request() {
        let auth = controller(None);
        assert_eq!(auth.restore().await, None);
        assert_eq!(backend(&auth).request_count(), 0);
    }

    #[tokio::test]
    async fn test_restore_with_valid_token() {
        let auth = controller(Some("stored"));
        backend(&auth).respond_json(200, doctor_json("drjones"));

        let doctor = auth.restore().await.unwrap();
        assert_eq!(doctor.user_name, "drjones");
        assert!(auth.is_authenticated());
        assert_eq!(backend(&auth).requests()[0].bearer.as_deref(), Some("stored"));
    }

    #[tokio::test]
    async fn test_restore_with_rejected_token_clears_it() {
        let auth = controller(Some("expired"));
        backend(&auth).respond_json(401, serde_json::json!({"detail": "Could not validate credentials"}));

        assert_eq!(auth.restore().await, None);
        assert!(!auth.api.session().has_token());
        assert_eq!(auth.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_restore_network_failure_also_clears_token() {
        let auth = controller(Some("stored"));
        backend(&auth).fail(ApiError::Network("offline".into()));

        assert_eq!(auth.restore().await, None);
        assert!(!auth.api.session().has_token());
    }

    #[tokio::test]
    async fn test_removed_token_collapses_state() {
        let auth = controller(None);
        backend(&auth).respond_json(200, login_json("tok-1", "drsmith"));
        auth.login("drsmith", "secret").await.unwrap();

        auth.api.session().clear();
        assert_eq!(auth.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_logout_is_unconditional() {
        let auth = controller(None);
        auth.logout();
        assert_eq!(auth.state(), AuthState::Anonymous);

        backend(&auth).respond_json(200, login_json("tok-1", "drsmith"));
        auth.login("drsmith", "secret").await.unwrap();
        auth.logout();
        assert!(!auth.is_authenticated());
        assert!(!auth.api.session().has_token());
    }
}
