pub mod composite;
pub mod rfactor;
