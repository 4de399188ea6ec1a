use chrono::{DateTime, Utc};
use diesel;
use diesel::prelude::*;
use diesel::r2d2;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::time::Duration;

use super::DocumentStore;
use crate::error::{Error, Result};
use crate::models::{
    Beer, Brewery, LoginSession, NewBeer, NewBrewery, NewLoginSession, NewUser, User,
};
use crate::schema;

pub type Pool = r2d2::Pool<r2d2::ConnectionManager<PgConnection>>;
pub type Connection = r2d2::PooledConnection<r2d2::ConnectionManager<PgConnection>>;

sql_function! {
    /// Diesel does not ship Postgres' `lower`.
    fn lower(a: diesel::sql_types::VarChar) -> diesel::sql_types::VarChar;
}

sql_function! {
    fn array_append(
        a: diesel::sql_types::Array<diesel::sql_types::Int4>,
        b: diesel::sql_types::Int4
    ) -> diesel::sql_types::Array<diesel::sql_types::Int4>;
}

sql_function! {
    fn array_remove(
        a: diesel::sql_types::Array<diesel::sql_types::Int4>,
        b: diesel::sql_types::Int4
    ) -> diesel::sql_types::Array<diesel::sql_types::Int4>;
}

/// PostgreSQL store using an r2d2 connection pool.
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn connect(database_url: &str, max_size: u32, timeout: Duration) -> Result<PgStore> {
        let manager = r2d2::ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(timeout)
            .build(manager)?;

        Ok(PgStore { pool })
    }

    fn conn(&self) -> Result<Connection> {
        Ok(self.pool.get()?)
    }
}

impl DocumentStore for PgStore {
    fn insert_brewery(&self, new_brewery: &NewBrewery) -> Result<Brewery> {
        use self::schema::brewery::dsl::*;

        Ok(diesel::insert_into(brewery)
            .values(new_brewery)
            .get_result(&self.conn()?)?)
    }

    fn find_brewery(&self, brewery_id: i32) -> Result<Option<Brewery>> {
        use self::schema::brewery::dsl::*;

        Ok(brewery
            .find(brewery_id)
            .first::<Brewery>(&self.conn()?)
            .optional()?)
    }

    fn append_beer_id(&self, brewery_id: i32, new_beer_id: i32) -> Result<Brewery> {
        use self::schema::brewery::dsl::*;

        let conn = self.conn()?;

        let updated = diesel::update(
            brewery
                .find(brewery_id)
                .filter(diesel::dsl::not(beer_ids.contains(vec![new_beer_id]))),
        )
        .set(beer_ids.eq(array_append(beer_ids, new_beer_id)))
        .get_result::<Brewery>(&conn)
        .optional()?;

        // No row updated: either the id was already listed or the brewery is gone.
        match updated {
            Some(updated) => Ok(updated),
            None => brewery
                .find(brewery_id)
                .first::<Brewery>(&conn)
                .optional()?
                .ok_or_else(|| Error::not_found("brewery", brewery_id)),
        }
    }

    fn remove_beer_id(&self, brewery_id: i32, old_beer_id: i32) -> Result<()> {
        use self::schema::brewery::dsl::*;

        diesel::update(brewery.find(brewery_id))
            .set(beer_ids.eq(array_remove(beer_ids, old_beer_id)))
            .execute(&self.conn()?)?;
        Ok(())
    }

    fn insert_beer(&self, new_beer: &NewBeer) -> Result<Beer> {
        use self::schema::beer::dsl::*;

        Ok(diesel::insert_into(beer)
            .values(new_beer)
            .get_result(&self.conn()?)?)
    }

    fn delete_beer(&self, beer_id: i32) -> Result<()> {
        use self::schema::beer::dsl::*;

        diesel::delete(beer.find(beer_id)).execute(&self.conn()?)?;
        Ok(())
    }

    fn find_beers_by_brewery(&self, owner: i32) -> Result<Vec<Beer>> {
        use self::schema::beer::dsl::*;

        Ok(beer
            .filter(brewery_id.eq(owner))
            .order(id.asc())
            .load::<Beer>(&self.conn()?)?)
    }

    fn insert_user(&self, new_user: &NewUser) -> Result<User> {
        use self::schema::app_user::dsl::*;

        match diesel::insert_into(app_user)
            .values(new_user)
            .get_result(&self.conn()?)
        {
            Ok(user) => Ok(user),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Err(
                Error::Conflict(format!("username {} is already taken", new_user.username)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    fn find_user_by_username(&self, name: &str) -> Result<Option<User>> {
        use self::schema::app_user::dsl::*;

        Ok(app_user
            .filter(lower(username).eq(name.to_lowercase()))
            .first::<User>(&self.conn()?)
            .optional()?)
    }

    fn insert_session(&self, new_session: &NewLoginSession) -> Result<LoginSession> {
        use self::schema::login_session::dsl::*;

        let conn = self.conn()?;

        let purged = diesel::delete(login_session.filter(expires_at.le(Utc::now())))
            .execute(&conn)?;
        if purged > 0 {
            debug!("Purged {} expired login sessions", purged);
        }

        Ok(diesel::insert_into(login_session)
            .values(new_session)
            .get_result(&conn)?)
    }

    fn find_user_by_session(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        use self::schema::app_user;
        use self::schema::login_session;

        Ok(app_user::table
            .inner_join(login_session::table)
            .filter(login_session::id.eq(token))
            .filter(login_session::expires_at.gt(now))
            .select((
                app_user::id,
                app_user::username,
                app_user::email,
                app_user::password_hash,
                app_user::created_at,
            ))
            .first::<User>(&self.conn()?)
            .optional()?)
    }
}
