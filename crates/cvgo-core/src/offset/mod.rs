mod finder;
mod resolver;
mod scanner;
mod signature;

pub use finder::*;
pub use resolver::*;
pub use scanner::*;
pub use signature::*;
