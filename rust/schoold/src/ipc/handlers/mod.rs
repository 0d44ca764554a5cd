pub mod academics;
pub mod ai;
pub mod attendance;
pub mod backup;
pub mod behavior;
pub mod clinic;
pub mod core;
pub mod dashboard;
pub mod events;
pub mod gate;
pub mod leave;
pub mod links;
pub mod logs;
pub mod notifications;
pub mod print;
pub mod schools;
pub mod session;
pub mod students;
pub mod users;
pub mod visitors;
