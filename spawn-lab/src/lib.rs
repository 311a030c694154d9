pub mod simulate;
pub mod util;
