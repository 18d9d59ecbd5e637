pub mod chat;
pub mod config_cmd;
pub mod resolve_date;
pub mod serve;
