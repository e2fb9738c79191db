//! Accepts Stripe payments for custom t-shirt designs and places exactly one
//! Teemill print-on-demand order per paid order.

pub mod config;
pub mod errors;
pub mod fulfillment;
pub mod models;
pub mod services;
pub mod web;
