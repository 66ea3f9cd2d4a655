// Demo tool sets shipped with the CLI

pub mod calculator;
pub mod cart;
