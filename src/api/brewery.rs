use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};

use super::{parse_body, parse_id, required};
use crate::auth;
use crate::db::{self, AddBeerToBrewery, AppState, CreateBrewery, GetBrewery};
use crate::error::{Error, Result};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BreweryForm {
    name: Option<String>,
    address: Option<String>,
    phone_number: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct BeerForm {
    name: Option<String>,
    style: Option<String>,
    ibu: Option<String>,
}

/// `POST /api/brewery`
///
/// Expects a JSON body with `name`, `address`, `phoneNumber` and
/// `timestamp`; all are required. The brewery is owned by the caller.
pub async fn create_brewery(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let user = auth::authenticate(&req, &state).await?;
    let form: BreweryForm = parse_body(&body)?;

    let query = CreateBrewery {
        owner_id: user.id,
        name: required(form.name, "name")?,
        address: required(form.address, "address")?,
        phone_number: required(form.phone_number, "phoneNumber")?,
        created_at: form
            .timestamp
            .ok_or_else(|| Error::ValidationFailure("timestamp is required".into()))?,
    };

    let brewery = db::execute(&state, query).await?;
    Ok(HttpResponse::Ok().json(brewery))
}

/// `GET /api/brewery/{id}`, with the brewery's beers embedded.
pub async fn get_brewery(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    auth::authenticate(&req, &state).await?;
    let id = parse_id(&path, "brewery")?;

    let brewery = db::execute(&state, GetBrewery { id }).await?;
    Ok(HttpResponse::Ok().json(brewery))
}

/// `POST /api/brewery/{id}/beer`
///
/// Creates a beer from `name`, `style` and `ibu` and links it into the brewery.
pub async fn add_beer(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    auth::authenticate(&req, &state).await?;
    let brewery_id = parse_id(&path, "brewery")?;
    let form: BeerForm = parse_body(&body)?;

    let query = AddBeerToBrewery {
        brewery_id,
        name: required(form.name, "name")?,
        style: required(form.style, "style")?,
        ibu: required(form.ibu, "ibu")?,
    };

    let beer = db::execute(&state, query).await?;
    Ok(HttpResponse::Ok().json(beer))
}
