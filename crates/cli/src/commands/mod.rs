pub mod config_cmd;
pub mod replay;
pub mod tools;
