use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::DocumentStore;
use crate::error::{Error, Result};
use crate::models::{
    Beer, Brewery, LoginSession, NewBeer, NewBrewery, NewLoginSession, NewUser, User,
};

#[derive(Debug, Default)]
struct Collections {
    last_id: i32,
    breweries: BTreeMap<i32, Brewery>,
    beers: BTreeMap<i32, Beer>,
    users: BTreeMap<i32, User>,
    sessions: HashMap<String, LoginSession>,
}

impl Collections {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }
}

/// In-process store backed by ordered maps behind one lock.
///
/// Used for tests and for running the API without PostgreSQL.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<Collections>> {
        self.collections.read().map_err(|_| Error::StorePoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<Collections>> {
        self.collections.write().map_err(|_| Error::StorePoisoned)
    }

    #[cfg(test)]
    pub fn beer_count(&self) -> usize {
        self.collections.read().unwrap().beers.len()
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.collections.read().unwrap().sessions.len()
    }

    #[cfg(test)]
    pub fn brewery_count(&self) -> usize {
        self.collections.read().unwrap().breweries.len()
    }
}

impl DocumentStore for MemoryStore {
    fn insert_brewery(&self, new_brewery: &NewBrewery) -> Result<Brewery> {
        let mut collections = self.write()?;
        let id = collections.next_id();

        let brewery = Brewery {
            id,
            name: new_brewery.name.to_owned(),
            address: new_brewery.address.to_owned(),
            phone_number: new_brewery.phone_number.to_owned(),
            created_at: new_brewery.created_at,
            owner_id: new_brewery.owner_id,
            beer_ids: Vec::new(),
        };
        collections.breweries.insert(id, brewery.clone());

        Ok(brewery)
    }

    fn find_brewery(&self, id: i32) -> Result<Option<Brewery>> {
        Ok(self.read()?.breweries.get(&id).cloned())
    }

    fn append_beer_id(&self, brewery_id: i32, beer_id: i32) -> Result<Brewery> {
        let mut collections = self.write()?;

        match collections.breweries.get_mut(&brewery_id) {
            Some(brewery) => {
                if !brewery.beer_ids.contains(&beer_id) {
                    brewery.beer_ids.push(beer_id);
                }
                Ok(brewery.clone())
            }
            None => Err(Error::not_found("brewery", brewery_id)),
        }
    }

    fn remove_beer_id(&self, brewery_id: i32, beer_id: i32) -> Result<()> {
        if let Some(brewery) = self.write()?.breweries.get_mut(&brewery_id) {
            brewery.beer_ids.retain(|id| *id != beer_id);
        }
        Ok(())
    }

    fn insert_beer(&self, new_beer: &NewBeer) -> Result<Beer> {
        let mut collections = self.write()?;
        let id = collections.next_id();

        let beer = Beer {
            id,
            name: new_beer.name.to_owned(),
            style: new_beer.style.to_owned(),
            ibu: new_beer.ibu.to_owned(),
            brewery_id: new_beer.brewery_id,
            created_at: Utc::now(),
        };
        collections.beers.insert(id, beer.clone());

        Ok(beer)
    }

    fn delete_beer(&self, id: i32) -> Result<()> {
        self.write()?.beers.remove(&id);
        Ok(())
    }

    fn find_beers_by_brewery(&self, brewery_id: i32) -> Result<Vec<Beer>> {
        Ok(self
            .read()?
            .beers
            .values()
            .filter(|beer| beer.brewery_id == brewery_id)
            .cloned()
            .collect())
    }

    fn insert_user(&self, new_user: &NewUser) -> Result<User> {
        let mut collections = self.write()?;

        let lowered = new_user.username.to_lowercase();
        if collections
            .users
            .values()
            .any(|user| user.username.to_lowercase() == lowered)
        {
            return Err(Error::Conflict(format!(
                "username {} is already taken",
                new_user.username
            )));
        }

        let id = collections.next_id();
        let user = User {
            id,
            username: new_user.username.to_owned(),
            email: new_user.email.to_owned(),
            password_hash: new_user.password_hash.to_owned(),
            created_at: Utc::now(),
        };
        collections.users.insert(id, user.clone());

        Ok(user)
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let lowered = username.to_lowercase();

        Ok(self
            .read()?
            .users
            .values()
            .find(|user| user.username.to_lowercase() == lowered)
            .cloned())
    }

    fn insert_session(&self, new_session: &NewLoginSession) -> Result<LoginSession> {
        let mut collections = self.write()?;

        if !collections.users.contains_key(&new_session.user_id) {
            return Err(Error::not_found("user", new_session.user_id));
        }

        let now = Utc::now();
        collections
            .sessions
            .retain(|_, session| session.expires_at > now);

        let session = LoginSession {
            id: new_session.id.to_owned(),
            user_id: new_session.user_id,
            created_at: Utc::now(),
            expires_at: new_session.expires_at,
        };
        collections
            .sessions
            .insert(session.id.clone(), session.clone());

        Ok(session)
    }

    fn find_user_by_session(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let collections = self.read()?;

        Ok(collections
            .sessions
            .get(token)
            .filter(|session| session.expires_at > now)
            .and_then(|session| collections.users.get(&session.user_id))
            .cloned())
    }
}
