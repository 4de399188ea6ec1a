use actix_web::{web, HttpRequest, HttpResponse};
use regex::Regex;

use super::{parse_body, required};
use crate::auth;
use crate::db::{self, AppState, CreateUser, SignIn};
use crate::error::{Error, Result};
use crate::models::LoginSession;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

#[derive(Deserialize)]
struct SignupForm {
    username: Option<String>,
    password: Option<String>,
    email: Option<String>,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

impl From<LoginSession> for TokenResponse {
    fn from(session: LoginSession) -> TokenResponse {
        TokenResponse { token: session.id }
    }
}

/// `POST /api/signup`
///
/// Expects `username`, `password` and `email`; responds with a bearer token.
pub async fn signup(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse> {
    let form: SignupForm = parse_body(&body)?;

    let email = required(form.email, "email")?;
    if !EMAIL.is_match(&email) {
        return Err(Error::ValidationFailure(format!(
            "{} is not an email address",
            email
        )));
    }

    let query = CreateUser {
        username: required(form.username, "username")?,
        password: required(form.password, "password")?,
        email,
        session_ttl: state.session_ttl,
    };

    let session = db::execute(&state, query).await?;
    Ok(HttpResponse::Ok().json(TokenResponse::from(session)))
}

/// `GET /api/signin` with HTTP Basic credentials; responds with a bearer token.
pub async fn signin(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    let (username, password) = auth::basic_credentials(&req).ok_or(Error::Unauthorized)?;

    let query = SignIn {
        username,
        password,
        session_ttl: state.session_ttl,
    };

    let session = db::execute(&state, query).await?;
    Ok(HttpResponse::Ok().json(TokenResponse::from(session)))
}
