pub mod auth;
pub mod backend;
pub mod blob;
pub mod comment;
pub mod config;
pub mod environment;
pub mod errors;
pub mod file;
pub mod identity;
pub mod media;
pub mod normalization;
pub mod profile;
pub mod queries;
pub mod registry;
pub mod routes;
pub mod upload;
pub mod urls;
pub mod validation;
pub mod video;
pub mod views;
