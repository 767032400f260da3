pub mod descriptor;
pub mod errors;
pub mod value;

pub use descriptor::*;
pub use errors::*;
pub use value::*;
