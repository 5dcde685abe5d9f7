// core.rs splits ledger responsibilities into submodules: canonical hashing,
// the chain itself, and candidate-chain validation.
pub mod canonical;
pub mod chain;
pub mod validation;

pub use canonical::*;
pub use chain::*;
pub use validation::*;
