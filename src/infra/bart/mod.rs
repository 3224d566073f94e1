mod client;

pub use client::{BART_API_URL, BartClient};
