use crate::cex::Counterexample;
use crate::message::Invariant;
use std::collections::{BTreeMap, BTreeSet};

/// Reporting contract. Console, XML and spreadsheet implementations live
/// with the front end; the director only ever talks to this trait.
///
/// Each resolved property triggers exactly one terminal call; `write_unknown`
/// is called at most once, with every property the run could not resolve.
pub trait Writer: Send {
    fn begin(&mut self) {}

    fn write_valid(
        &mut self,
        properties: &[String],
        k: usize,
        runtime: f64,
        invariants: &[Invariant],
        ivcs: &BTreeMap<String, BTreeSet<String>>,
    );

    fn write_invalid(&mut self, property: &str, cex: &Counterexample, runtime: f64);

    fn write_unknown(
        &mut self,
        properties: &[String],
        inductive_cexs: &BTreeMap<String, Counterexample>,
        runtime: f64,
    );

    fn end(&mut self) {}
}
