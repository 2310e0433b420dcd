pub mod messages;
pub mod threads;
pub mod wsroute;
