mod account;
mod audit;
mod goal;
mod ledger;
mod money;
mod project;

pub use account::*;
pub use audit::*;
pub use goal::*;
pub use ledger::*;
pub use money::*;
pub use project::*;
