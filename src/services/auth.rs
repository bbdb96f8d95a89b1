//! Auth service for local accounts, JWTs and Google sign-in.
//!
//! Handles authentication via:
//! - Email and password (Argon2 hashes)
//! - Google OAuth with PKCE
//! - Short-lived access tokens renewed from server-tracked refresh tokens

use std::time::Duration;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, AuthorizationCode, ClientId,
    ClientSecret, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::{AuthConfig, GoogleConfig};
use crate::db::{self, AuthProvider, CreateUser, DbPool, User};
use crate::error::{Error, Result};
use crate::models::{new_id, now_millis};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// OAuth state duration
const STATE_DURATION_MINUTES: i64 = 10;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Kind of JWT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(rename = "type")]
    pub typ: TokenType,
    /// Refresh token id, tracked server-side by hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Access and refresh token for one sign-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// User info from Google
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Service for authentication and authorization.
#[derive(Clone)]
pub struct AuthService {
    db: DbPool,
    config: AuthConfig,
    default_credits: i64,
    http_client: Client,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(db: DbPool, config: AuthConfig, default_credits: i64) -> Result<Self> {
        let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            db,
            config,
            default_credits,
            http_client,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Local accounts
    // ------------------------------------------------------------------------

    /// Register a local account and sign it in.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(User, TokenPair)> {
        let user = self.create_local_user(name, email, password).await?;
        let tokens = self.issue_tokens(&user.id).await?;

        info!(user_id = %user.id, "User registered");
        Ok((user, tokens))
    }

    /// Create a local account without issuing tokens.
    pub async fn create_local_user(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let name = name.trim();
        let email = email.trim().to_lowercase();

        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(Error::Validation(
                "Please provide name, email and password".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(Error::Validation("Please provide a valid email".to_string()));
        }
        if password.len() < 6 {
            return Err(Error::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        if db::get_user_by_email(&self.db, &email).await?.is_some() {
            return Err(Error::AlreadyExists("User already exists".to_string()));
        }

        db::create_user(
            &self.db,
            CreateUser {
                id: new_id(),
                name: name.to_string(),
                email,
                password_hash: Some(hash_password(password)?),
                google_id: None,
                avatar: None,
                provider: AuthProvider::Local,
                credits: self.default_credits,
            },
        )
        .await
    }

    /// Check credentials of a local account.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(Error::Validation("Please provide email and password".to_string()));
        }

        let user = db::get_user_by_email(&self.db, email.trim())
            .await?
            .ok_or(Error::InvalidCredentials)?;

        if user.provider_enum() == AuthProvider::Google {
            return Err(Error::Validation(
                "This account uses Google sign-in. Please continue with Google.".to_string(),
            ));
        }

        let hash = user.password_hash.as_deref().ok_or(Error::InvalidCredentials)?;
        if !verify_password(password, hash) {
            return Err(Error::InvalidCredentials);
        }

        Ok(user)
    }

    /// Sign in a local account.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair)> {
        let user = self.authenticate(email, password).await?;
        let tokens = self.issue_tokens(&user.id).await?;

        info!(user_id = %user.id, "User logged in");
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a new pair. The old refresh token is
    /// deactivated.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(User, TokenPair)> {
        let (claims, record) = self.validate_refresh_token(refresh_token).await?;
        db::deactivate_refresh_token(&self.db, &record.id).await?;

        let user = db::get_user(&self.db, &claims.sub).await?;
        let tokens = self.issue_tokens(&user.id).await?;

        debug!(user_id = %user.id, "Refresh token rotated");
        Ok((user, tokens))
    }

    /// Deactivate every refresh token of the user.
    pub async fn logout(&self, user_id: &str) -> Result<()> {
        let revoked = db::deactivate_user_refresh_tokens(&self.db, user_id).await?;
        info!(user_id = %user_id, revoked, "User logged out");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------------

    /// Issue an access token and a tracked refresh token.
    pub async fn issue_tokens(&self, user_id: &str) -> Result<TokenPair> {
        let access_token = self.access_token(user_id)?;

        let jti = nanoid::nanoid!(32);
        let refresh_token = self.sign(
            user_id,
            TokenType::Refresh,
            Some(jti.clone()),
            self.config.refresh_ttl_secs,
            &self.config.jwt_refresh_secret,
        )?;

        db::create_refresh_token(
            &self.db,
            &new_id(),
            user_id,
            &hash_token(&jti),
            now_millis() + self.config.refresh_ttl_secs * 1000,
        )
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Issue a short-lived access token.
    pub fn access_token(&self, user_id: &str) -> Result<String> {
        self.sign(
            user_id,
            TokenType::Access,
            None,
            self.config.access_ttl_secs,
            &self.config.jwt_secret,
        )
    }

    /// Issue a long-lived access token for the legacy user routes.
    pub fn legacy_token(&self, user_id: &str) -> Result<String> {
        self.sign(
            user_id,
            TokenType::Access,
            None,
            self.config.legacy_ttl_secs,
            &self.config.jwt_secret,
        )
    }

    /// Validate an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        let claims = self.verify(token, &self.config.jwt_secret)?;
        if claims.typ != TokenType::Access {
            return Err(Error::InvalidToken);
        }
        Ok(claims)
    }

    /// Validate a refresh token against its server-side record.
    pub async fn validate_refresh_token(
        &self,
        token: &str,
    ) -> Result<(Claims, db::RefreshToken)> {
        let claims = self.verify(token, &self.config.jwt_refresh_secret)?;
        if claims.typ != TokenType::Refresh {
            return Err(Error::InvalidToken);
        }

        let jti = claims.jti.as_deref().ok_or(Error::InvalidToken)?;
        let record = db::get_active_refresh_token(&self.db, &hash_token(jti))
            .await?
            .ok_or(Error::InvalidToken)?;

        if record.user_id != claims.sub {
            return Err(Error::InvalidToken);
        }

        Ok((claims, record))
    }

    fn sign(
        &self,
        user_id: &str,
        typ: TokenType,
        jti: Option<String>,
        ttl_secs: i64,
        secret: &str,
    ) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + ttl_secs,
            typ,
            jti,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
    }

    fn verify(&self, token: &str, secret: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )?;
        Ok(data.claims)
    }

    // ------------------------------------------------------------------------
    // Google sign-in
    // ------------------------------------------------------------------------

    /// Start a Google sign-in. Returns the authorization URL to redirect to.
    pub async fn google_authorization_url(&self) -> Result<String> {
        let google = self.google()?;
        let client = build_google_client(google)?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        db::cleanup_oauth_states(&self.db).await?;
        db::create_oauth_state(
            &self.db,
            state.secret(),
            pkce_verifier.secret(),
            now_millis() + STATE_DURATION_MINUTES * 60 * 1000,
        )
        .await?;

        Ok(auth_url.to_string())
    }

    /// Finish a Google sign-in: exchange the code, then find or create the user.
    pub async fn google_callback(&self, code: &str, state: &str) -> Result<(User, TokenPair)> {
        let google = self.google()?;

        let oauth_state = db::take_oauth_state(&self.db, state)
            .await?
            .ok_or(Error::InvalidToken)?;

        let client = build_google_client(google)?;
        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(oauth_state.pkce_verifier))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::OAuth(format!("Code exchange failed: {}", e)))?;

        let info = self
            .google_user_info(token_response.access_token().secret())
            .await?;
        let user = self.upsert_google_user(&info).await?;
        let tokens = self.issue_tokens(&user.id).await?;

        info!(user_id = %user.id, provider = %user.provider, "User authenticated with Google");
        Ok((user, tokens))
    }

    fn google(&self) -> Result<&GoogleConfig> {
        self.config
            .google
            .as_ref()
            .ok_or_else(|| Error::NotFound("Google sign-in is not configured".to_string()))
    }

    async fn google_user_info(&self, access_token: &str) -> Result<GoogleUserInfo> {
        let response = self
            .http_client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::OAuth(format!("Failed to get user info: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::OAuth("Failed to get user info".to_string()));
        }

        response
            .json()
            .await
            .map_err(|e| Error::OAuth(format!("Failed to parse user info: {}", e)))
    }

    /// Link by Google id, then by email, else create a Google account.
    pub async fn upsert_google_user(&self, info: &GoogleUserInfo) -> Result<User> {
        if let Some(user) = db::get_user_by_google_id(&self.db, &info.sub).await? {
            return Ok(user);
        }

        let email = info
            .email
            .as_deref()
            .ok_or_else(|| Error::OAuth("Google account has no email".to_string()))?;

        if let Some(user) = db::get_user_by_email(&self.db, email).await? {
            return db::link_google_account(&self.db, &user.id, &info.sub, info.picture.as_deref())
                .await;
        }

        db::create_user(
            &self.db,
            CreateUser {
                id: new_id(),
                name: info.name.clone().unwrap_or_else(|| email.to_string()),
                email: email.to_string(),
                password_hash: None,
                google_id: Some(info.sub.clone()),
                avatar: info.picture.clone(),
                provider: AuthProvider::Google,
                credits: self.default_credits,
            },
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Cookies
    // ------------------------------------------------------------------------

    pub fn access_cookie(&self, token: &str) -> Cookie<'static> {
        self.cookie(ACCESS_COOKIE, token, self.config.access_ttl_secs)
    }

    pub fn refresh_cookie(&self, token: &str) -> Cookie<'static> {
        self.cookie(REFRESH_COOKIE, token, self.config.refresh_ttl_secs)
    }

    fn cookie(&self, name: &'static str, value: &str, max_age_secs: i64) -> Cookie<'static> {
        Cookie::build((name, value.to_string()))
            .path("/")
            .http_only(true)
            .secure(self.config.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(max_age_secs))
            .build()
    }

    /// Expired cookie that removes `name` from the browser.
    pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
        Cookie::build((name, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::ZERO)
            .build()
    }
}

/// Build OAuth client for Google.
fn build_google_client(google: &GoogleConfig) -> Result<BasicClient> {
    let client = BasicClient::new(
        ClientId::new(google.client_id.clone()),
        Some(ClientSecret::new(google.client_secret.clone())),
        AuthUrl::new(GOOGLE_AUTH_URL.to_string())
            .map_err(|e| Error::Internal(format!("Invalid auth URL: {}", e)))?,
        Some(
            TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
                .map_err(|e| Error::Internal(format!("Invalid token URL: {}", e)))?,
        ),
    )
    .set_redirect_uri(
        RedirectUrl::new(google.redirect_url.clone())
            .map_err(|e| Error::Internal(format!("Invalid redirect URL: {}", e)))?,
    );

    Ok(client)
}

/// Hash a password with Argon2 and a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Hash a token id for storage.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_test_db;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "access-secret".to_string(),
            jwt_refresh_secret: "refresh-secret".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 3600,
            legacy_ttl_secs: 3600,
            google: None,
            secure_cookies: false,
        }
    }

    async fn service() -> AuthService {
        AuthService::new(setup_test_db().await, auth_config(), 100).unwrap()
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let auth = service().await;

        let (user, tokens) = auth.register("Ada", "Ada@Example.com", "secret1").await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.credits, 100);

        let claims = auth.verify_access_token(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, user.id);

        let (again, _) = auth.login("ada@example.com", "secret1").await.unwrap();
        assert_eq!(again.id, user.id);

        assert!(matches!(
            auth.login("ada@example.com", "wrong").await,
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            auth.register("Ada", "ada@example.com", "secret1").await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotation() {
        let auth = service().await;
        let (_, tokens) = auth.register("Bo", "bo@example.com", "secret1").await.unwrap();

        // Refresh tokens are not access tokens
        assert!(auth.verify_access_token(&tokens.refresh_token).is_err());

        let (_, rotated) = auth.refresh(&tokens.refresh_token).await.unwrap();
        assert!(matches!(
            auth.refresh(&tokens.refresh_token).await,
            Err(Error::InvalidToken)
        ));
        assert!(auth.refresh(&rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_tokens() {
        let auth = service().await;
        let (user, tokens) = auth.register("Cy", "cy@example.com", "secret1").await.unwrap();

        auth.logout(&user.id).await.unwrap();
        assert!(auth.validate_refresh_token(&tokens.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_access_token() {
        let mut config = auth_config();
        config.access_ttl_secs = -10;
        let auth = AuthService::new(setup_test_db().await, config, 100).unwrap();

        let token = auth.access_token("someone").unwrap();
        assert!(matches!(auth.verify_access_token(&token), Err(Error::TokenExpired)));
    }

    #[tokio::test]
    async fn test_google_user_linking() {
        let auth = service().await;
        let (local, _) = auth.register("Di", "di@example.com", "secret1").await.unwrap();

        let linked = auth
            .upsert_google_user(&GoogleUserInfo {
                sub: "google-1".to_string(),
                email: Some("di@example.com".to_string()),
                name: Some("Di".to_string()),
                picture: None,
            })
            .await
            .unwrap();
        assert_eq!(linked.id, local.id);
        assert_eq!(linked.provider_enum(), AuthProvider::Both);

        let created = auth
            .upsert_google_user(&GoogleUserInfo {
                sub: "google-2".to_string(),
                email: Some("new@example.com".to_string()),
                name: None,
                picture: None,
            })
            .await
            .unwrap();
        assert_eq!(created.provider_enum(), AuthProvider::Google);

        // Google-only accounts cannot use password login
        assert!(matches!(
            auth.login("new@example.com", "anything").await,
            Err(Error::Validation(_))
        ));
    }
}
