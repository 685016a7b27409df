pub mod activity;
pub mod admin;
pub mod events;
pub mod invitations;
pub mod live;
pub mod profiles;
pub mod videos;
