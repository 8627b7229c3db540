/// One step of a pattern's predicates in their flat form: the operator name
/// as a string, then its arguments, then `Done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PredicateStep {
    Capture(u32),
    /// Index into the query's string table.
    String(u32),
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryPredicateArg {
    Capture(u32),
    String(Box<str>),
}

/// A predicate such as `(#eq? @name "main")`, resolved but not evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryPredicate {
    pub operator: Box<str>,
    pub args: Vec<QueryPredicateArg>,
}
