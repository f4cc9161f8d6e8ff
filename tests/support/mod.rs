#![allow(dead_code)]

pub mod architecture;
pub mod feed;
pub mod peer;
