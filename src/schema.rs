diesel::table! {
    attendance (roll_no, date) {
        roll_no -> Text,
        date -> Date,
        status -> Text,
        captured_at -> Timestamp,
        confidence -> Text,
        class_name -> Text,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    descriptors (id) {
        id -> Integer,
        roll_no -> Text,
        vector -> Text,
    }
}

diesel::table! {
    students (roll_no) {
        roll_no -> Text,
        full_name -> Text,
        class_name -> Text,
        section -> Nullable<Text>,
        parent_name -> Nullable<Text>,
        parent_phone -> Nullable<Text>,
        parent_email -> Nullable<Text>,
        updated_at -> Timestamp,
    }
}

diesel::joinable!(attendance -> students (roll_no));
diesel::joinable!(descriptors -> students (roll_no));

diesel::allow_tables_to_appear_in_same_query!(
    attendance,
    descriptors,
    students,
);
