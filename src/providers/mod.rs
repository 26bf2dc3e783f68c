pub mod github;
pub mod zenhub;
