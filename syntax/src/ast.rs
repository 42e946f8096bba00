/// type alias just to make type signatures look more consistent.
pub type Ident<'a> = &'a str;

/// The right-hand side of a `key = value` line.
#[derive(Debug, PartialEq, Eq)]
pub enum Value<'a> {
    /// "some quoted value" or unquoted_value_without_spaces
    Literal { val: &'a str },
    /// comma-separated word list, e.g. `after = prep, convolve`
    List { items: Vec<&'a str> },
}

impl<'a> Value<'a> {
    /// View this value as a flat list of words, whether it was written
    /// as a single literal or a comma-separated list.
    pub fn words(&self) -> &[&'a str] {
        match self {
            Self::Literal { val } => std::slice::from_ref(val),
            Self::List { items } => items,
        }
    }
}

/// A single `key = value` line inside a section.
#[derive(Debug, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub key: Ident<'a>,
    pub value: Value<'a>,
}

/// A `[stage NAME]` section and its assignment lines.
#[derive(Debug, PartialEq, Eq)]
pub struct StageBlock<'a> {
    /// Stage name (unique within a definition; checked by the model layer)
    pub name: Ident<'a>,
    /// Assignment lines in file order
    pub assignments: Vec<Assignment<'a>>,
}

/// One top-level section in the definition file.
#[derive(Debug, PartialEq, Eq)]
pub enum Item<'a> {
    /// A `[defaults]` section of global resource defaults.
    Defaults(Vec<Assignment<'a>>),
    /// A `[stage NAME]` section.
    Stage(StageBlock<'a>),
    /// A `[limits]` section (only valid in a scheduler limits file).
    Limits(Vec<Assignment<'a>>),
}

// These methods are just to assist with writing more legible tests.
#[cfg(test)]
impl<'a> Value<'a> {
    pub fn literal(val: &'a str) -> Self {
        Self::Literal { val }
    }
    pub fn list(items: Vec<&'a str>) -> Self {
        Self::List { items }
    }
}

#[cfg(test)]
impl<'a> Assignment<'a> {
    pub fn new(key: &'a str, value: Value<'a>) -> Self {
        Self { key, value }
    }
    pub fn literal(key: &'a str, val: &'a str) -> Self {
        Self {
            key,
            value: Value::Literal { val },
        }
    }
}
