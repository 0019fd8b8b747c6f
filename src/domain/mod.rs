// Domain layer - Core types with no I/O
pub mod region;
pub mod tiles;
pub mod track;
