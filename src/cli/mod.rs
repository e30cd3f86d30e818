mod clear;
mod label;
mod load;
pub mod server;

pub use clear::*;
pub use label::*;
pub use load::*;
pub use server::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
