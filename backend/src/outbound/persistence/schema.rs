//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the deployed schema exactly; Diesel uses
//! them for compile-time query validation. Regenerate with
//! `diesel print-schema` after schema changes.

diesel::table! {
    /// Account records.
    accounts (id) {
        id -> Uuid,
        /// Lower-cased login, unique.
        login -> Varchar,
        /// Lower-cased e-mail address, unique.
        email -> Varchar,
        password_hash -> Varchar,
        first_name -> Nullable<Varchar>,
        last_name -> Nullable<Varchar>,
        activated -> Bool,
        lang_key -> Nullable<Varchar>,
        image_url -> Nullable<Varchar>,
        activation_key -> Nullable<Varchar>,
        reset_key -> Nullable<Varchar>,
        reset_date -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Authorities granted to an account.
    account_authorities (account_id, authority) {
        account_id -> Uuid,
        authority -> Varchar,
    }
}

diesel::table! {
    /// Catalogue of known authority names.
    authorities (name) {
        name -> Varchar,
    }
}

diesel::joinable!(account_authorities -> accounts (account_id));
diesel::allow_tables_to_appear_in_same_query!(accounts, account_authorities, authorities);
