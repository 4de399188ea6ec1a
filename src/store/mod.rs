//! Persistence for breweries, beers, users and login sessions.
//!
//! Every call is synchronous; the HTTP layer runs them on the blocking
//! pool through [`crate::db::execute`].

use chrono::{DateTime, Utc};

use super::error::Result;
use super::models::{
    Beer, Brewery, LoginSession, NewBeer, NewBrewery, NewLoginSession, NewUser, User,
};

mod memory;
mod pg;

pub use self::memory::MemoryStore;
pub use self::pg::PgStore;

pub trait DocumentStore: Send + Sync {
    fn insert_brewery(&self, new_brewery: &NewBrewery) -> Result<Brewery>;

    fn find_brewery(&self, id: i32) -> Result<Option<Brewery>>;

    /// Atomically append `beer_id` to the brewery's `beer_ids`, unless it
    /// is already listed.
    ///
    /// Returns `Error::NotFound` if the brewery no longer exists.
    fn append_beer_id(&self, brewery_id: i32, beer_id: i32) -> Result<Brewery>;

    /// Remove every occurrence of `beer_id` from the brewery's `beer_ids`.
    /// A missing brewery is not an error.
    fn remove_beer_id(&self, brewery_id: i32, beer_id: i32) -> Result<()>;

    fn insert_beer(&self, new_beer: &NewBeer) -> Result<Beer>;

    fn delete_beer(&self, id: i32) -> Result<()>;

    /// All beers whose back-reference points at `brewery_id`, ordered by id.
    fn find_beers_by_brewery(&self, brewery_id: i32) -> Result<Vec<Beer>>;

    /// Returns `Error::Conflict` if the username is taken (case-insensitive).
    fn insert_user(&self, new_user: &NewUser) -> Result<User>;

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Sessions that have already expired are purged on every insert.
    fn insert_session(&self, new_session: &NewLoginSession) -> Result<LoginSession>;

    /// The owner of session `token`, if the session exists and has not
    /// expired as of `now`.
    fn find_user_by_session(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>>;
}
