#![allow(dead_code)]

pub mod assertions;
pub mod console;
