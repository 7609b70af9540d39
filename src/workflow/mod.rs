pub mod login_flow;

pub use login_flow::{LoginFlow, LoginOutcome, LoginState};
