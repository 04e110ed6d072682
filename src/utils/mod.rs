pub mod keyed_lock;
pub mod validation;
