#![allow(non_snake_case)]

pub mod bmc;
pub mod cex;
pub mod config;
pub mod director;
pub mod expr;
pub mod interval;
pub mod intervalgen;
pub mod invgen;
pub mod ivc;
pub mod kind;
pub mod message;
pub mod reduce;
pub mod smooth;
pub mod solver;
pub mod spec;
pub mod writer;

use crate::solver::SolverError;
use thiserror::Error;

/// One proof strategy, run to completion on its own thread. An engine
/// communicates only by posting messages; a returned error is recorded by
/// the director as a fault without stopping the other engines.
pub trait Engine: Send {
    fn name(&self) -> &'static str;

    fn run(&mut self) -> Result<(), EngineError>;
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Solver(#[from] SolverError),
}
