table! {
    app_user (id) {
        id -> Int4,
        username -> Varchar,
        email -> Varchar,
        password_hash -> Varchar,
        created_at -> Timestamptz,
    }
}

table! {
    beer (id) {
        id -> Int4,
        name -> Varchar,
        style -> Varchar,
        ibu -> Varchar,
        brewery_id -> Int4,
        created_at -> Timestamptz,
    }
}

table! {
    brewery (id) {
        id -> Int4,
        name -> Varchar,
        address -> Varchar,
        phone_number -> Varchar,
        created_at -> Timestamptz,
        owner_id -> Int4,
        beer_ids -> Array<Int4>,
    }
}

table! {
    login_session (id) {
        id -> Varchar,
        user_id -> Int4,
        created_at -> Timestamptz,
        expires_at -> Timestamptz,
    }
}

joinable!(beer -> brewery (brewery_id));
joinable!(brewery -> app_user (owner_id));
joinable!(login_session -> app_user (user_id));

allow_tables_to_appear_in_same_query!(
    app_user,
    beer,
    brewery,
    login_session,
);
