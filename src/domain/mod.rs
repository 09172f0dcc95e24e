pub mod forecast;
pub mod history;

pub use forecast::*;
pub use history::*;
