pub mod assignments;
pub mod auth;
pub mod class_schedules;
pub mod core;
pub mod courses;
pub mod enrollments;
pub mod materials;
pub mod meetings;
pub mod mentor_schedules;
pub mod mentoring;
pub mod profiles;
