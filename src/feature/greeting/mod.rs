pub mod greeting_api;
