diesel::table! {
    organisations (id) {
        id -> Int8,
        name -> Text,
        reference -> Nullable<Text>,
        organisation_type -> Nullable<Text>,
        parent_organisation_id -> Nullable<Int8>,
    }
}

diesel::table! {
    systems (id) {
        id -> Int8,
        organisation_id -> Int8,
        name -> Text,
        description -> Nullable<Text>,
        reference -> Nullable<Text>,
        last_assessed -> Nullable<Text>,
        hosting_type -> Array<Text>,
        corporate_services -> Array<Text>,
    }
}

diesel::table! {
    users (id) {
        id -> Int8,
        email -> Text,
        first_name -> Text,
        last_name -> Text,
    }
}

diesel::table! {
    user_profiles (id) {
        id -> Int8,
        user_id -> Int8,
        organisation_id -> Int8,
        role -> Text,
    }
}

diesel::table! {
    assessors (id) {
        id -> Int8,
        organisation_id -> Int8,
        name -> Text,
        email -> Text,
        contact_name -> Text,
        address -> Text,
        phone_number -> Text,
        assessor_type -> Text,
        is_active -> Bool,
    }
}

diesel::table! {
    assessor_members (assessor_id, user_profile_id) {
        assessor_id -> Int8,
        user_profile_id -> Int8,
    }
}

diesel::table! {
    configurations (id) {
        id -> Int8,
        name -> Text,
        current_assessment_period -> Text,
        assessment_period_end -> Timestamptz,
        default_framework -> Text,
    }
}

diesel::table! {
    assessments (id) {
        id -> Int8,
        reference -> Nullable<Text>,
        system_id -> Int8,
        assessment_period -> Text,
        status -> Text,
        framework -> Text,
        caf_profile -> Text,
        review_type -> Nullable<Text>,
        assessments_data -> Jsonb,
        created_by -> Nullable<Int8>,
        last_updated_by -> Nullable<Int8>,
        created_on -> Timestamptz,
        last_updated -> Timestamptz,
    }
}

diesel::table! {
    reviews (id) {
        id -> Int8,
        reference -> Nullable<Text>,
        assessment_id -> Int8,
        assessed_by_id -> Nullable<Int8>,
        status -> Text,
        review_data -> Jsonb,
        last_updated_by -> Nullable<Int8>,
        version -> Int4,
        created_on -> Timestamptz,
        last_updated -> Timestamptz,
    }
}

diesel::table! {
    review_versions (id) {
        id -> Int8,
        review_id -> Int8,
        version_number -> Int4,
        review_data -> Jsonb,
        recorded_at -> Timestamptz,
    }
}

diesel::table! {
    last_accessed_times (email) {
        email -> Text,
        last_accessed -> Timestamptz,
    }
}

diesel::table! {
    user_sessions (id) {
        id -> Text,
        email -> Text,
        current_profile_id -> Nullable<Int8>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(systems -> organisations (organisation_id));
diesel::joinable!(user_profiles -> organisations (organisation_id));
diesel::joinable!(user_profiles -> users (user_id));
diesel::joinable!(assessors -> organisations (organisation_id));
diesel::joinable!(assessor_members -> assessors (assessor_id));
diesel::joinable!(assessor_members -> user_profiles (user_profile_id));
diesel::joinable!(assessments -> systems (system_id));
diesel::joinable!(reviews -> assessments (assessment_id));
diesel::joinable!(reviews -> assessors (assessed_by_id));
diesel::joinable!(review_versions -> reviews (review_id));

diesel::allow_tables_to_appear_in_same_query!(
    organisations,
    systems,
    users,
    user_profiles,
    assessors,
    assessor_members,
    configurations,
    assessments,
    reviews,
    review_versions,
    last_accessed_times,
    user_sessions,
);
