pub mod config;
pub mod db;
pub mod document;
pub mod environment;
pub mod errors;
pub mod ids;
pub mod io;
pub mod matcher;
pub mod mime_type;
pub mod normalization;
pub mod pet;
pub mod progress;
pub mod requirements;
pub mod routes;
pub mod store;
pub mod times;
pub mod trip;
pub mod tutor;
pub mod upload;
