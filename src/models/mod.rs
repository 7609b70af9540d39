pub mod login;
pub mod status;

pub use login::{extract_login_context, Credentials, LoginContext};
pub use status::{StatusInfo, SubmitResult, STATUS_MARKER};
