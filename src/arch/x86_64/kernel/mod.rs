pub mod processor;
pub mod registers;
pub mod smp;
