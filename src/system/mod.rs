pub mod impurity;

pub use impurity::ImpuritySystem;
