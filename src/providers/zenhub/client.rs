mod core;
mod issues;
mod transfers;

pub use self::core::ZenHubClient;
