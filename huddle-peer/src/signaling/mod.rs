mod loopback;
mod signaling_output;

pub use loopback::*;
pub use signaling_output::*;
