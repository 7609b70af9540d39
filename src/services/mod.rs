pub mod auth_service;
pub mod captcha_solver;
pub mod session_store;
pub mod status_service;

pub use auth_service::AuthService;
pub use captcha_solver::{solver_from_config, CaptchaSolver, CommandCaptchaSolver, LlmCaptchaSolver};
pub use session_store::SessionStore;
pub use status_service::{ProbeOutcome, StatusService};
