pub mod assist;
pub mod projects;
pub mod session;
pub mod visualize;
