#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::{expired_certificate, lenient_cache, valid_certificate};
