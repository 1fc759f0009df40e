//! Esquema Diesel declarado a mano. Reemplazable con `diesel print-schema`.

diesel::table! {
    computers (id) {
        id -> Uuid,
        name -> Text,
        hostname -> Text,
        transport -> Text,
        scheduler -> Text,
        workdir -> Text,
    }
}

diesel::table! {
    codes (id) {
        id -> Uuid,
        label -> Text,
        description -> Text,
        input_handler -> Text,
        prepend_text -> Text,
        append_text -> Text,
        source_kind -> Text,
        folder -> Nullable<Text>,
        rel_path -> Nullable<Text>,
        computer_id -> Nullable<Uuid>,
        remote_path -> Nullable<Text>,
        content_hash -> Text,
        metadata -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    groups (id) {
        id -> Uuid,
        name -> Text,
        description -> Text,
        owner -> Text,
        user_defined -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    group_codes (group_id, code_id) {
        group_id -> Uuid,
        code_id -> Uuid,
    }
}

diesel::table! {
    workflows (id) {
        id -> Uuid,
        label -> Text,
        description -> Text,
        version -> Integer,
    }
}

diesel::joinable!(codes -> computers (computer_id));
diesel::joinable!(group_codes -> groups (group_id));
diesel::joinable!(group_codes -> codes (code_id));

diesel::allow_tables_to_appear_in_same_query!(
    computers,
    codes,
    groups,
    group_codes,
    workflows,
);
