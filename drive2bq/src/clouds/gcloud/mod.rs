//! Interfaces to Google Cloud.

pub(crate) mod auth;
pub(crate) mod bigquery;
mod client;
pub(crate) mod drive;

pub(crate) use client::*;
