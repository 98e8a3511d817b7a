pub mod definition;
pub mod equation;
pub mod expression;
pub mod level;
pub mod meta;
pub mod prelude;
