table! {
    doctrine (id) {
        id -> Integer,
        scripture_study_id -> Integer,
        doctrine_name -> Text,
    }
}

table! {
    scripture_study (id) {
        id -> Integer,
        volume -> Text,
        book -> Text,
        chapter -> Text,
        verse -> Text,
    }
}

table! {
    year_info (id) {
        id -> Integer,
        scripture_study_id -> Integer,
        year_of_event -> Integer,
        age -> Text,
    }
}

joinable!(doctrine -> scripture_study (scripture_study_id));
joinable!(year_info -> scripture_study (scripture_study_id));

allow_tables_to_appear_in_same_query!(
    doctrine,
    scripture_study,
    year_info,
);
