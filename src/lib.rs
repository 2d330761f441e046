pub mod booking;
pub mod cache_version;
pub mod catalog;
pub mod config;
pub mod contact;
pub mod crypto;
pub mod display;
pub mod error;
pub mod form;
pub mod notify;
pub mod parser;
pub mod reviews;
pub mod schedule;
pub mod store;
pub mod web;
