use std::io;
use std::path::{Path, PathBuf};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::AppError;
use crate::server::AppState;

/// Name of the private cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_token";

const TOKEN_LEN: usize = 48;

/// Single-user session store.
///
/// Exactly one token is valid at a time. It is persisted to a file so a
/// restart does not log the user out; login and logout both replace it.
pub struct SessionStore {
    password_hash: String,
    token_file: PathBuf,
    current: RwLock<String>,
}

impl SessionStore {
    /// Validate the password hash and load (or create) the persisted token.
    pub async fn open(password_hash: impl Into<String>, token_file: impl Into<PathBuf>) -> Result<Self, AppError> {
        let password_hash = password_hash.into();
        let token_file = token_file.into();

        PasswordHash::new(&password_hash).map_err(|e| {
            AppError::Configuration(format!(
                "ACCESS_PASSWORD_HASH is not a valid Argon2 hash ({}); generate one with `hash_password`",
                e
            ))
        })?;

        let token = match tokio::fs::read_to_string(&token_file).await {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            Ok(_) => fresh_persisted_token(&token_file).await?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => fresh_persisted_token(&token_file).await?,
            Err(e) => {
                return Err(AppError::Configuration(format!(
                    "cannot read session token file {}: {}",
                    token_file.display(),
                    e
                )))
            }
        };
        info!("session token loaded from {}", token_file.display());

        Ok(Self {
            password_hash,
            token_file,
            current: RwLock::new(token),
        })
    }

    pub fn verify_password(&self, password: &str) -> bool {
        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Check the password and issue a new session token. `None` on a wrong password.
    pub async fn login(&self, password: &str) -> Result<Option<String>, AppError> {
        if !self.verify_password(password) {
            warn!("login rejected: password verification failed");
            return Ok(None);
        }
        let token = self.rotate().await?;
        info!("login successful; session token rotated");
        Ok(Some(token))
    }

    /// Invalidate the current session by rotating the persisted token.
    pub async fn logout(&self) -> Result<(), AppError> {
        self.rotate().await?;
        info!("logout: session token rotated");
        Ok(())
    }

    pub async fn is_valid(&self, token: &str) -> bool {
        !token.is_empty() && *self.current.read().await == token
    }

    async fn rotate(&self) -> Result<String, AppError> {
        let mut current = self.current.write().await;
        let token = fresh_persisted_token(&self.token_file).await?;
        *current = token.clone();
        Ok(token)
    }
}

async fn fresh_persisted_token(path: &Path) -> Result<String, AppError> {
    let token = generate_token();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| token_file_error(path, e))?;
    }
    tokio::fs::write(path, &token).await.map_err(|e| token_file_error(path, e))?;
    Ok(token)
}

fn token_file_error(path: &Path, e: io::Error) -> AppError {
    AppError::Configuration(format!("cannot write session token file {}: {}", path.display(), e))
}

pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Hash a password with Argon2 and a random salt (PHC string).
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))
}

/// Request guard: succeeds when the private session cookie holds the current token.
pub struct Authenticated;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Authenticated {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(state) = req.rocket().state::<AppState>() else {
            return Outcome::Error((
                Status::InternalServerError,
                AppError::Configuration("application state missing".into()),
            ));
        };

        let valid = match req.cookies().get_private(SESSION_COOKIE) {
            Some(cookie) => state.sessions.is_valid(cookie.value()).await,
            None => false,
        };
        if valid {
            Outcome::Success(Authenticated)
        } else {
            Outcome::Error((Status::Unauthorized, AppError::Unauthorized))
        }
    }
}
