//! Entity descriptors shipped with the crate

pub mod demo;
