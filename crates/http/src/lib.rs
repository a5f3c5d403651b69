#![deny(unsafe_code)]

mod client;
mod error;

pub use client::ReqwestClient;
pub use error::{HttpError, HttpResult};
