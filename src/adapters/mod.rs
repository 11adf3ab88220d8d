pub mod api;
pub mod db;
pub mod kotiakku_http;
pub mod kotiakku_replay;
