mod args;
mod authenticate;
#[allow(clippy::module_inception)]
mod channel;
mod constants;
mod patterns;
mod read_loop;
mod read_until;
mod send_input;
mod write;

pub use args::Args;
pub use channel::Channel;
pub use constants::DEFAULT_RETURN_CHAR;
pub use patterns::{
    default_password_pattern,
    default_prompt_pattern,
    default_username_pattern,
    enable_prompt_pattern,
};
