pub mod error;
pub mod formula;
pub mod interp;
pub mod runtime;
pub mod value;
pub mod variables;
