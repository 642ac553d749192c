pub mod greeting_service;
