table! {
    users (id) {
        id -> Uuid,
        created_at -> Timestamptz,
        username -> Text,
    }
}

table! {
    groups (id) {
        id -> Int4,
        title -> Text,
        slug -> Text,
        description -> Text,
    }
}

table! {
    posts (id) {
        id -> Int4,
        text -> Text,
        pub_date -> Timestamptz,
        author_id -> Uuid,
        group_id -> Nullable<Int4>,
        image -> Nullable<Text>,
    }
}

table! {
    comments (id) {
        id -> Int4,
        post_id -> Int4,
        author_id -> Uuid,
        text -> Text,
        created -> Timestamptz,
    }
}

// Both columns reference users, so there's no joinable! for this table.
table! {
    follows (id) {
        id -> Int4,
        user_id -> Uuid,
        author_id -> Uuid,
    }
}

joinable!(posts -> users (author_id));
joinable!(posts -> groups (group_id));
joinable!(comments -> posts (post_id));
joinable!(comments -> users (author_id));

allow_tables_to_appear_in_same_query!(users, groups, posts, comments, follows);
