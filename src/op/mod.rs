pub mod bounds;
pub mod check;
pub mod collect;
pub mod compare;
pub mod elaborate;
pub mod equations;
pub mod levels;
pub mod normalize;
pub mod size;
pub mod substitute;
pub mod traverse;
pub mod typing;
