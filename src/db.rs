use actix_rt::time::timeout;
use actix_web::error::BlockingError;
use actix_web::web;
use chrono::{DateTime, Utc};

use std::sync::Arc;
use std::time::Duration;

use super::auth;
use super::error::{Error, Result};
use super::models;
use super::store::DocumentStore;

/// Shared per-worker application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub query_timeout: Duration,
    pub session_ttl: chrono::Duration,
}

pub trait Query {
    type Item: Send;

    fn execute(&self, store: &dyn DocumentStore) -> Result<Self::Item>;
}

/// Run `query` on the blocking thread pool, bounded by the configured timeout.
///
/// A timed out query keeps running to completion on its blocking thread;
/// only the response is abandoned.
pub async fn execute<T>(state: &AppState, query: T) -> Result<T::Item>
where
    T: Query + Send + 'static,
    T::Item: 'static,
{
    let store = state.store.clone();
    let blocking = web::block(move || query.execute(store.as_ref()));

    match timeout(state.query_timeout, blocking).await {
        Ok(Ok(item)) => Ok(item),
        Ok(Err(BlockingError::Error(e))) => Err(e),
        Ok(Err(BlockingError::Canceled)) => Err(Error::Canceled),
        Err(_) => Err(Error::Timeout),
    }
}

/*************************************/
/** Create Brewery                  **/
/*************************************/

pub struct CreateBrewery {
    pub owner_id: i32,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

impl Query for CreateBrewery {
    type Item = models::Brewery;

    fn execute(&self, store: &dyn DocumentStore) -> Result<Self::Item> {
        let brewery = store.insert_brewery(&models::NewBrewery {
            name: &self.name,
            address: &self.address,
            phone_number: &self.phone_number,
            created_at: self.created_at,
            owner_id: self.owner_id,
        })?;

        debug!("Created brewery {} for user {}", brewery.id, self.owner_id);
        Ok(brewery)
    }
}

/*************************************/
/** Get Brewery with its beers      **/
/*************************************/

/// Loads a brewery with its beers embedded in association order.
///
/// Beers that point at the brewery but are missing from its `beer_ids`
/// (left behind by an interrupted association) are linked back in.
pub struct GetBrewery {
    pub id: i32,
}

impl Query for GetBrewery {
    type Item = models::PopulatedBrewery;

    fn execute(&self, store: &dyn DocumentStore) -> Result<Self::Item> {
        let mut brewery = store
            .find_brewery(self.id)?
            .ok_or_else(|| Error::not_found("brewery", self.id))?;

        let mut candidates = store.find_beers_by_brewery(brewery.id)?;

        let mut beers = Vec::with_capacity(candidates.len());
        for beer_id in &brewery.beer_ids {
            if let Some(pos) = candidates.iter().position(|b| b.id == *beer_id) {
                beers.push(candidates.swap_remove(pos));
            }
        }

        // Whatever is left references this brewery without being listed.
        candidates.sort_by_key(|b| b.id);
        for orphan in candidates {
            warn!(
                "Beer {} references brewery {} but is not linked; back-filling",
                orphan.id, brewery.id
            );
            brewery = store.append_beer_id(brewery.id, orphan.id)?;
            beers.push(orphan);
        }

        Ok(models::PopulatedBrewery::new(brewery, beers))
    }
}

/*************************************/
/** Add Beer to Brewery             **/
/*************************************/

/// Creates a beer and links it into its owning brewery.
///
/// If linking fails, the new beer is unlinked and deleted again and the
/// failure is reported as `Error::PartialWriteInconsistency`.
pub struct AddBeerToBrewery {
    pub brewery_id: i32,
    pub name: String,
    pub style: String,
    pub ibu: String,
}

impl Query for AddBeerToBrewery {
    type Item = models::Beer;

    fn execute(&self, store: &dyn DocumentStore) -> Result<Self::Item> {
        let brewery = store
            .find_brewery(self.brewery_id)?
            .ok_or_else(|| Error::not_found("brewery", self.brewery_id))?;

        let beer = store.insert_beer(&models::NewBeer {
            name: &self.name,
            style: &self.style,
            ibu: &self.ibu,
            brewery_id: brewery.id,
        })?;

        if let Err(cause) = store.append_beer_id(brewery.id, beer.id) {
            error!(
                "Linking beer {} into brewery {} failed: {}",
                beer.id, brewery.id, cause
            );

            // A concurrent read may already have back-filled the id.
            let compensated = match store
                .remove_beer_id(brewery.id, beer.id)
                .and_then(|()| store.delete_beer(beer.id))
            {
                Ok(()) => true,
                Err(e) => {
                    error!("Beer {} is orphaned, compensation failed: {}", beer.id, e);
                    false
                }
            };

            return Err(Error::PartialWriteInconsistency {
                brewery_id: brewery.id,
                beer_id: beer.id,
                compensated,
                cause: Box::new(cause),
            });
        }

        debug!("Added beer {} to brewery {}", beer.id, brewery.id);
        Ok(beer)
    }
}

/********************************/
/** Sign up                    **/
/********************************/

/// Creates a user and opens their first login session.
pub struct CreateUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub session_ttl: chrono::Duration,
}

impl Query for CreateUser {
    type Item = models::LoginSession;

    fn execute(&self, store: &dyn DocumentStore) -> Result<Self::Item> {
        let password_hash = auth::hash_password(&self.password)?;

        let user = store.insert_user(&models::NewUser {
            username: &self.username,
            email: &self.email,
            password_hash: &password_hash,
        })?;

        info!("Created user {} ({})", user.id, user.username);
        open_session(store, user.id, self.session_ttl)
    }
}

/********************************/
/** Sign in                    **/
/********************************/

/// Checks a username/password pair and opens a new login session.
pub struct SignIn {
    pub username: String,
    pub password: String,
    pub session_ttl: chrono::Duration,
}

impl Query for SignIn {
    type Item = models::LoginSession;

    fn execute(&self, store: &dyn DocumentStore) -> Result<Self::Item> {
        let user = match store.find_user_by_username(&self.username)? {
            Some(user) => user,
            None => {
                // Unknown users pay for a hash check too.
                auth::verify_dummy_password(&self.password);
                return Err(Error::Unauthorized);
            }
        };

        if !auth::verify_password(&self.password, &user.password_hash)? {
            return Err(Error::Unauthorized);
        }

        open_session(store, user.id, self.session_ttl)
    }
}

fn open_session(
    store: &dyn DocumentStore,
    user_id: i32,
    ttl: chrono::Duration,
) -> Result<models::LoginSession> {
    let token = auth::new_session_token();

    store.insert_session(&models::NewLoginSession {
        id: &token,
        user_id,
        expires_at: Utc::now() + ttl,
    })
}

/********************************/
/** Get Logged-in User         **/
/********************************/

/// Resolves the user owning a bearer `session_id`.
pub struct GetLoggedInUser {
    pub session_id: String,
}

impl GetLoggedInUser {
    pub fn from_session(session_id: String) -> GetLoggedInUser {
        GetLoggedInUser { session_id }
    }
}

impl Query for GetLoggedInUser {
    type Item = models::User;

    fn execute(&self, store: &dyn DocumentStore) -> Result<Self::Item> {
        store
            .find_user_by_session(&self.session_id, Utc::now())?
            .ok_or(Error::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Beer, Brewery, LoginSession, NewBeer, NewBrewery, NewLoginSession, NewUser, User,
    };
    use crate::store::MemoryStore;

    fn create_brewery(store: &dyn DocumentStore) -> Brewery {
        CreateBrewery {
            owner_id: 1,
            name: "the brewery name".into(),
            address: "the address".into(),
            phone_number: "555-555-5555".into(),
            created_at: Utc::now(),
        }
        .execute(store)
        .unwrap()
    }

    fn add_beer(brewery_id: i32) -> AddBeerToBrewery {
        AddBeerToBrewery {
            brewery_id,
            name: "test beer".into(),
            style: "test style".into(),
            ibu: "45".into(),
        }
    }

    /// Delegates to a `MemoryStore`, optionally racing a read against the
    /// link step or failing individual writes.
    #[derive(Default)]
    struct Scripted {
        inner: MemoryStore,
        read_before_link: bool,
        link_fails: bool,
        delete_fails: bool,
        find_delay: Option<Duration>,
    }

    impl DocumentStore for Scripted {
        fn insert_brewery(&self, new_brewery: &NewBrewery) -> Result<Brewery> {
            self.inner.insert_brewery(new_brewery)
        }
        fn find_brewery(&self, id: i32) -> Result<Option<Brewery>> {
            if let Some(delay) = self.find_delay {
                std::thread::sleep(delay);
            }
            self.inner.find_brewery(id)
        }
        fn append_beer_id(&self, brewery_id: i32, beer_id: i32) -> Result<Brewery> {
            if self.read_before_link {
                GetBrewery { id: brewery_id }.execute(&self.inner)?;
            }
            if self.link_fails {
                return Err(Error::Timeout);
            }
            self.inner.append_beer_id(brewery_id, beer_id)
        }
        fn remove_beer_id(&self, brewery_id: i32, beer_id: i32) -> Result<()> {
            self.inner.remove_beer_id(brewery_id, beer_id)
        }
        fn insert_beer(&self, new_beer: &NewBeer) -> Result<Beer> {
            self.inner.insert_beer(new_beer)
        }
        fn delete_beer(&self, id: i32) -> Result<()> {
            if self.delete_fails {
                return Err(Error::Timeout);
            }
            self.inner.delete_beer(id)
        }
        fn find_beers_by_brewery(&self, brewery_id: i32) -> Result<Vec<Beer>> {
            self.inner.find_beers_by_brewery(brewery_id)
        }
        fn insert_user(&self, new_user: &NewUser) -> Result<User> {
            self.inner.insert_user(new_user)
        }
        fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
            self.inner.find_user_by_username(username)
        }
        fn insert_session(&self, new_session: &NewLoginSession) -> Result<LoginSession> {
            self.inner.insert_session(new_session)
        }
        fn find_user_by_session(
            &self,
            token: &str,
            now: DateTime<Utc>,
        ) -> Result<Option<User>> {
            self.inner.find_user_by_session(token, now)
        }
    }

    #[test]
    fn added_beer_references_its_brewery() {
        let store = MemoryStore::new();
        let brewery = create_brewery(&store);

        let beer = add_beer(brewery.id).execute(&store).unwrap();

        assert_eq!(beer.brewery_id, brewery.id);
        assert_eq!(beer.name, "test beer");
        assert_eq!(beer.style, "test style");
        assert_eq!(beer.ibu, "45");
    }

    #[test]
    fn added_beer_is_last_in_beer_ids() {
        let store = MemoryStore::new();
        let brewery = create_brewery(&store);

        let first = add_beer(brewery.id).execute(&store).unwrap();
        let second = add_beer(brewery.id).execute(&store).unwrap();

        let stored = store.find_brewery(brewery.id).unwrap().unwrap();
        assert_eq!(stored.beer_ids, vec![first.id, second.id]);
        assert_eq!(stored.beer_ids.last(), Some(&second.id));
    }

    #[test]
    fn unknown_brewery_is_not_found_and_writes_nothing() {
        let store = MemoryStore::new();
        create_brewery(&store);

        match add_beer(9999).execute(&store) {
            Err(Error::NotFound(msg)) => assert_eq!(msg, "brewery 9999 not found"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert_eq!(store.beer_count(), 0);
    }

    #[test]
    fn failed_link_deletes_the_new_beer() {
        let store = Scripted {
            link_fails: true,
            ..Default::default()
        };
        let brewery = create_brewery(&store);

        match add_beer(brewery.id).execute(&store) {
            Err(Error::PartialWriteInconsistency {
                brewery_id,
                compensated,
                ..
            }) => {
                assert_eq!(brewery_id, brewery.id);
                assert!(compensated);
            }
            other => panic!("expected PartialWriteInconsistency, got {:?}", other),
        }
        assert_eq!(store.inner.beer_count(), 0);
        assert!(store
            .inner
            .find_brewery(brewery.id)
            .unwrap()
            .unwrap()
            .beer_ids
            .is_empty());
    }

    #[test]
    fn failed_compensation_is_reported() {
        let store = Scripted {
            link_fails: true,
            delete_fails: true,
            ..Default::default()
        };
        let brewery = create_brewery(&store);

        match add_beer(brewery.id).execute(&store) {
            Err(Error::PartialWriteInconsistency { compensated, .. }) => assert!(!compensated),
            other => panic!("expected PartialWriteInconsistency, got {:?}", other),
        }
        assert_eq!(store.inner.beer_count(), 1);
    }

    #[test]
    fn read_between_the_two_writes_does_not_duplicate_the_link() {
        let store = Scripted {
            read_before_link: true,
            ..Default::default()
        };
        let brewery = create_brewery(&store);

        let beer = add_beer(brewery.id).execute(&store).unwrap();

        let stored = store.inner.find_brewery(brewery.id).unwrap().unwrap();
        assert_eq!(stored.beer_ids, vec![beer.id]);
    }

    #[test]
    fn failed_link_undoes_a_concurrent_back_fill() {
        let store = Scripted {
            read_before_link: true,
            link_fails: true,
            ..Default::default()
        };
        let brewery = create_brewery(&store);

        match add_beer(brewery.id).execute(&store) {
            Err(Error::PartialWriteInconsistency { compensated, .. }) => assert!(compensated),
            other => panic!("expected PartialWriteInconsistency, got {:?}", other),
        }
        assert_eq!(store.inner.beer_count(), 0);
        assert!(store
            .inner
            .find_brewery(brewery.id)
            .unwrap()
            .unwrap()
            .beer_ids
            .is_empty());

        let populated = GetBrewery { id: brewery.id }.execute(&store.inner).unwrap();
        assert!(populated.beers.is_empty());
    }

    #[test]
    fn concurrent_associations_all_land() {
        const WRITERS: usize = 16;

        let store = Arc::new(MemoryStore::new());
        let brewery = create_brewery(store.as_ref());

        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                let store = store.clone();
                let brewery_id = brewery.id;
                std::thread::spawn(move || {
                    add_beer(brewery_id).execute(store.as_ref()).unwrap().id
                })
            })
            .collect();

        let mut added: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        added.sort();

        let mut linked = store.find_brewery(brewery.id).unwrap().unwrap().beer_ids;
        assert_eq!(linked.len(), WRITERS);
        linked.sort();
        linked.dedup();
        assert_eq!(linked, added);

        let mut back_refs: Vec<i32> = store
            .find_beers_by_brewery(brewery.id)
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        back_refs.sort();
        assert_eq!(back_refs, added);
    }

    #[actix_rt::test]
    async fn slow_queries_time_out() {
        let state = AppState {
            store: Arc::new(Scripted {
                find_delay: Some(Duration::from_millis(500)),
                ..Default::default()
            }),
            query_timeout: Duration::from_millis(10),
            session_ttl: chrono::Duration::hours(1),
        };

        match execute(&state, GetBrewery { id: 1 }).await {
            Err(Error::Timeout) => {}
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn fast_queries_pass_errors_through() {
        let state = AppState {
            store: Arc::new(MemoryStore::new()),
            query_timeout: Duration::from_secs(5),
            session_ttl: chrono::Duration::hours(1),
        };

        match execute(&state, GetBrewery { id: 1 }).await {
            Err(Error::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn orphaned_beer_is_back_filled_on_read() {
        let store = MemoryStore::new();
        let brewery = create_brewery(&store);
        let linked = add_beer(brewery.id).execute(&store).unwrap();

        // Simulate an association interrupted between the two writes.
        let orphan = store
            .insert_beer(&NewBeer {
                name: "orphan",
                style: "stout",
                ibu: "30",
                brewery_id: brewery.id,
            })
            .unwrap();

        let populated = GetBrewery { id: brewery.id }.execute(&store).unwrap();
        let ids: Vec<i32> = populated.beers.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![linked.id, orphan.id]);

        let stored = store.find_brewery(brewery.id).unwrap().unwrap();
        assert_eq!(stored.beer_ids, vec![linked.id, orphan.id]);
    }

    #[test]
    fn populated_beers_follow_association_order() {
        let store = MemoryStore::new();
        let brewery = create_brewery(&store);

        let first = store
            .insert_beer(&NewBeer {
                name: "first",
                style: "ipa",
                ibu: "60",
                brewery_id: brewery.id,
            })
            .unwrap();
        let second = add_beer(brewery.id).execute(&store).unwrap();
        store.append_beer_id(brewery.id, first.id).unwrap();

        let populated = GetBrewery { id: brewery.id }.execute(&store).unwrap();
        let names: Vec<&str> = populated.beers.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["test beer", "first"]);
        assert_eq!(populated.beers[0].id, second.id);
    }

    #[test]
    fn get_unknown_brewery_is_not_found() {
        let store = MemoryStore::new();

        match (GetBrewery { id: 3 }).execute(&store) {
            Err(Error::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn sign_up_then_sign_in_resolves_the_same_user() {
        let store = MemoryStore::new();
        let ttl = chrono::Duration::hours(1);

        let signup = CreateUser {
            username: "exampleuser".into(),
            password: "1234".into(),
            email: "exampleuser@test.com".into(),
            session_ttl: ttl,
        }
        .execute(&store)
        .unwrap();

        let signin = SignIn {
            username: "exampleuser".into(),
            password: "1234".into(),
            session_ttl: ttl,
        }
        .execute(&store)
        .unwrap();

        assert_ne!(signup.id, signin.id);
        assert_eq!(signup.user_id, signin.user_id);

        let user = GetLoggedInUser::from_session(signin.id)
            .execute(&store)
            .unwrap();
        assert_eq!(user.id, signup.user_id);
        assert_ne!(user.password_hash, "1234");
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let store = MemoryStore::new();
        let ttl = chrono::Duration::hours(1);

        CreateUser {
            username: "exampleuser".into(),
            password: "1234".into(),
            email: "exampleuser@test.com".into(),
            session_ttl: ttl,
        }
        .execute(&store)
        .unwrap();

        for (username, password) in &[("exampleuser", "4321"), ("nobody", "1234")] {
            let result = SignIn {
                username: (*username).into(),
                password: (*password).into(),
                session_ttl: ttl,
            }
            .execute(&store);

            match result {
                Err(Error::Unauthorized) => {}
                other => panic!("expected Unauthorized, got {:?}", other),
            }
        }
    }
}
