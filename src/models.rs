use super::schema::*;
use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq, Serialize, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct Brewery {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "userId")]
    pub owner_id: i32,
    pub beer_ids: Vec<i32>,
}

#[derive(Insertable)]
#[table_name = "brewery"]
pub struct NewBrewery<'a> {
    pub name: &'a str,
    pub address: &'a str,
    pub phone_number: &'a str,
    pub created_at: DateTime<Utc>,
    pub owner_id: i32,
}

/// A brewery as returned to clients, with its beers embedded in
/// association order instead of bare ids.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedBrewery {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "userId")]
    pub owner_id: i32,
    pub beers: Vec<Beer>,
}

impl PopulatedBrewery {
    pub fn new(brewery: Brewery, beers: Vec<Beer>) -> PopulatedBrewery {
        PopulatedBrewery {
            id: brewery.id,
            name: brewery.name,
            address: brewery.address,
            phone_number: brewery.phone_number,
            created_at: brewery.created_at,
            owner_id: brewery.owner_id,
            beers,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct Beer {
    pub id: i32,
    pub name: String,
    pub style: String,
    pub ibu: String,
    pub brewery_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "beer"]
pub struct NewBeer<'a> {
    pub name: &'a str,
    pub style: &'a str,
    pub ibu: &'a str,
    pub brewery_id: i32,
}

#[derive(Clone, Debug, Serialize, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "app_user"]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

#[derive(Clone, Debug, Queryable)]
pub struct LoginSession {
    pub id: String,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "login_session"]
pub struct NewLoginSession<'a> {
    pub id: &'a str,
    pub user_id: i32,
    pub expires_at: DateTime<Utc>,
}
