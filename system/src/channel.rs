pub mod membership_group;
pub mod transition;
pub mod transport;
