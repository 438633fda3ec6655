mod mk;

pub use mk::{Invocation, cmd_mk};
