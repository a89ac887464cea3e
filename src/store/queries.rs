//! Bundled SPARQL CONSTRUCT patterns run after correlation.

/// A named CONSTRUCT query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstructPattern {
    pub name: &'static str,
    pub query: &'static str,
}

/// Steps sharing a stage become `isConnectedWith` each other, both ways.
pub const STEP_LINKER: ConstructPattern = ConstructPattern {
    name: "step_linker",
    query: include_str!("../../data/queries/step_linker.rq"),
};

/// Species inherit one `hasInChI` from their calculations.
pub const INCHI_MAPPER: ConstructPattern = ConstructPattern {
    name: "inchi_mapper",
    query: include_str!("../../data/queries/inchi_mapper.rq"),
};

/// Every bundled pattern, in application order.
pub fn bundled() -> Vec<ConstructPattern> {
    vec![STEP_LINKER, INCHI_MAPPER]
}
