use actix_web::http::header;
use actix_web::HttpRequest;
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use textnonce::TextNonce;

use super::db::{self, AppState, GetLoggedInUser};
use super::error::{Error, Result};
use super::models::User;

/// Hash a plaintext password into an argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::PasswordHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::PasswordHash(e.to_string())),
    }
}

lazy_static! {
    static ref DUMMY_HASH: Option<String> = hash_password("beertap-dummy-password").ok();
}

/// Run a full verification against a throwaway hash, so a missing user
/// costs as much as a wrong password. Always returns `false`.
pub fn verify_dummy_password(password: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_ref() {
        let _ = verify_password(password, hash);
    }
    false
}

pub fn new_session_token() -> String {
    TextNonce::new().into_string()
}

fn authorization<'a>(req: &'a HttpRequest, scheme: &str) -> Option<&'a str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.splitn(2, ' ');

    match (parts.next(), parts.next()) {
        (Some(s), Some(credentials)) if s.eq_ignore_ascii_case(scheme) => {
            Some(credentials.trim())
        }
        _ => None,
    }
}

/// The token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    authorization(req, "Bearer").filter(|token| !token.is_empty())
}

/// The `(username, password)` pair from an `Authorization: Basic` header.
pub fn basic_credentials(req: &HttpRequest) -> Option<(String, String)> {
    let encoded = authorization(req, "Basic")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;

    let mut parts = decoded.splitn(2, ':');
    match (parts.next(), parts.next()) {
        (Some(username), Some(password)) if !username.is_empty() => {
            Some((username.to_owned(), password.to_owned()))
        }
        _ => None,
    }
}

/// Resolve the user behind the request's bearer token.
pub async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<User> {
    let token = bearer_token(req).ok_or(Error::Unauthorized)?;

    db::execute(state, GetLoggedInUser::from_session(token.to_owned())).await
}
