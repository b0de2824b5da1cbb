pub mod adapter;
pub mod api_key_repository;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod middleware;
pub mod rest;
pub mod service;
