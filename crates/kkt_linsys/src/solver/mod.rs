pub mod kkt;
pub mod ldl;
pub mod matrix;
pub mod ordering;
pub mod utils;
