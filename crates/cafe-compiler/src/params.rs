//! Parameter classification
//!
//! Turns the raw arity metadata of a compiled Python code object into an
//! ordered list of typed parameters:
//!
//! ```text
//! [positional][positional w/ default][*args?][keyword-only][**kwargs?]
//! ```

use crate::error::{CompileError, CompileResult};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Code flag: the function takes `*args`
pub const CO_VARARGS: u32 = 0x0004;
/// Code flag: the function takes `**kwargs`
pub const CO_VARKEYWORDS: u32 = 0x0008;

/// Key of the return annotation in [`CodeMetadata::annotations`]
pub const RETURN_ANNOTATION_KEY: &str = "return";

/// How a parameter binds caller-supplied arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

/// Declared type annotation of a parameter or return value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    /// Explicit `None` annotation: the callable produces no value
    NoValue,
    /// Process argument vector (entry points only)
    Argv,
    /// Any other annotation, by name
    Named(String),
}

/// Constant default value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A classified parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ConstValue>,
}

impl Parameter {
    pub fn positional(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::PositionalOrKeyword, None)
    }

    pub fn with_default(name: impl Into<String>, default: ConstValue) -> Self {
        Self::new(name, ParameterKind::PositionalOrKeyword, Some(default))
    }

    pub fn var_positional(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::VarPositional, None)
    }

    pub fn keyword_only(name: impl Into<String>, default: Option<ConstValue>) -> Self {
        Self::new(name, ParameterKind::KeywordOnly, default)
    }

    pub fn var_keyword(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::VarKeyword, None)
    }

    fn new(name: impl Into<String>, kind: ParameterKind, default: Option<ConstValue>) -> Self {
        Self {
            name: name.into(),
            kind,
            annotation: None,
            default,
        }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Position class in declaration order; a valid list never decreases
    fn order_rank(&self) -> u8 {
        match self.kind {
            ParameterKind::PositionalOrKeyword if self.has_default() => 1,
            ParameterKind::PositionalOrKeyword => 0,
            ParameterKind::VarPositional => 2,
            ParameterKind::KeywordOnly => 3,
            ParameterKind::VarKeyword => 4,
        }
    }
}

/// Parameters in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterList(Vec<Parameter>);

impl ParameterList {
    /// Build a list, checking ordering and uniqueness
    pub fn new(params: Vec<Parameter>) -> CompileResult<Self> {
        Self::validate(&params)?;
        Ok(Self(params))
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// A list holding one positional parameter
    pub(crate) fn single(param: Parameter) -> Self {
        debug_assert_eq!(param.kind, ParameterKind::PositionalOrKeyword);
        Self(vec![param])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.0.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.0.get(index)
    }

    pub fn first(&self) -> Option<&Parameter> {
        self.0.first()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.name.as_str())
    }

    pub fn kinds(&self) -> Vec<ParameterKind> {
        self.0.iter().map(|p| p.kind).collect()
    }

    /// The list with its first entry (the receiver) removed
    pub fn without_receiver(&self) -> Option<Self> {
        self.0.split_first().map(|(_, rest)| Self(rest.to_vec()))
    }

    pub fn var_positional(&self) -> Option<&Parameter> {
        self.0.iter().find(|p| p.kind == ParameterKind::VarPositional)
    }

    pub fn var_keyword(&self) -> Option<&Parameter> {
        self.0.iter().find(|p| p.kind == ParameterKind::VarKeyword)
    }

    fn validate(params: &[Parameter]) -> CompileResult<()> {
        let mut seen = FxHashSet::default();
        let mut rank = 0;
        let mut variadic = [false; 2];

        for param in params {
            if !seen.insert(param.name.as_str()) {
                return Err(CompileError::malformed(format!(
                    "duplicate parameter name '{}'",
                    param.name
                )));
            }

            let next = param.order_rank();
            if next < rank {
                return Err(CompileError::malformed(format!(
                    "parameter '{}' ({:?}) is out of declaration order",
                    param.name, param.kind
                )));
            }
            rank = next;

            let slot = match param.kind {
                ParameterKind::VarPositional => Some(0),
                ParameterKind::VarKeyword => Some(1),
                _ => None,
            };
            if let Some(slot) = slot {
                if variadic[slot] {
                    return Err(CompileError::malformed(format!(
                        "more than one {:?} parameter",
                        param.kind
                    )));
                }
                if param.has_default() {
                    return Err(CompileError::malformed(format!(
                        "variadic parameter '{}' cannot have a default",
                        param.name
                    )));
                }
                variadic[slot] = true;
            }
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a ParameterList {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Raw arity metadata of a compiled callable, as reported by introspection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeMetadata {
    /// Number of positional parameters
    pub arg_count: usize,
    /// Number of keyword-only parameters
    #[serde(default)]
    pub kwonly_arg_count: usize,
    /// Positional names, then keyword-only names, then `*args`/`**kwargs`
    /// names (further locals may follow)
    pub var_names: Vec<String>,
    /// `CO_*` flags
    #[serde(default)]
    pub flags: u32,
    /// Annotations by parameter name, plus `"return"` for the return type
    #[serde(default)]
    pub annotations: FxHashMap<String, Annotation>,
    /// Defaults of the trailing positional parameters
    #[serde(default)]
    pub defaults: Vec<ConstValue>,
    /// Defaults of keyword-only parameters, by name
    #[serde(default)]
    pub kw_defaults: FxHashMap<String, ConstValue>,
}

impl CodeMetadata {
    pub fn new<S: Into<String>>(
        arg_count: usize,
        kwonly_arg_count: usize,
        var_names: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            arg_count,
            kwonly_arg_count,
            var_names: var_names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse metadata emitted as JSON by the introspection layer
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_defaults(mut self, defaults: Vec<ConstValue>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_kw_default(mut self, name: impl Into<String>, value: ConstValue) -> Self {
        self.kw_defaults.insert(name.into(), value);
        self
    }

    pub fn with_annotation(mut self, name: impl Into<String>, annotation: Annotation) -> Self {
        self.annotations.insert(name.into(), annotation);
        self
    }

    /// Declared return annotation, if any
    pub fn return_annotation(&self) -> Option<&Annotation> {
        self.annotations.get(RETURN_ANNOTATION_KEY)
    }

    pub fn has_varargs(&self) -> bool {
        self.flags & CO_VARARGS != 0
    }

    pub fn has_varkeywords(&self) -> bool {
        self.flags & CO_VARKEYWORDS != 0
    }

    /// Number of positional plus keyword-only parameters
    pub fn named_arg_count(&self) -> CompileResult<usize> {
        self.arg_count
            .checked_add(self.kwonly_arg_count)
            .ok_or_else(|| {
                CompileError::malformed(format!(
                    "parameter counts {} + {} overflow",
                    self.arg_count, self.kwonly_arg_count
                ))
            })
    }

    /// Index of the `**kwargs` name in `var_names`
    pub fn varkeywords_index(&self) -> CompileResult<usize> {
        self.named_arg_count()?
            .checked_add(usize::from(self.has_varargs()))
            .ok_or_else(|| CompileError::malformed("**kwargs name index overflows"))
    }

    fn name_at(&self, index: usize, what: &str) -> CompileResult<&str> {
        self.var_names.get(index).map(String::as_str).ok_or_else(|| {
            CompileError::malformed(format!(
                "{what} name index {index} out of range ({} names)",
                self.var_names.len()
            ))
        })
    }

    fn parameter(&self, name: &str, kind: ParameterKind, default: Option<ConstValue>) -> Parameter {
        Parameter {
            name: name.to_string(),
            kind,
            annotation: self.annotations.get(name).cloned(),
            default,
        }
    }
}

/// Classify the parameters of a callable
pub fn classify(code: &CodeMetadata) -> CompileResult<ParameterList> {
    let pos_count = code.arg_count;
    let kwonly_count = code.kwonly_arg_count;

    let non_default_count = pos_count.checked_sub(code.defaults.len()).ok_or_else(|| {
        CompileError::malformed(format!(
            "{} positional defaults for {} positional parameters",
            code.defaults.len(),
            pos_count
        ))
    })?;

    let block_end = code.named_arg_count()?;
    if block_end > code.var_names.len() {
        return Err(CompileError::malformed(format!(
            "{} positional and {} keyword-only parameters but only {} names",
            pos_count,
            kwonly_count,
            code.var_names.len()
        )));
    }
    let positional = &code.var_names[..pos_count];
    let keyword_only = &code.var_names[pos_count..block_end];

    if let Some(stray) = code.kw_defaults.keys().find(|k| !keyword_only.contains(k)) {
        return Err(CompileError::malformed(format!(
            "keyword default for '{stray}' which is not a keyword-only parameter"
        )));
    }

    let mut params = Vec::with_capacity(block_end + 2);

    for name in &positional[..non_default_count] {
        params.push(code.parameter(name, ParameterKind::PositionalOrKeyword, None));
    }

    for (name, default) in positional[non_default_count..].iter().zip(&code.defaults) {
        params.push(code.parameter(
            name,
            ParameterKind::PositionalOrKeyword,
            Some(default.clone()),
        ));
    }

    if code.has_varargs() {
        let name = code.name_at(block_end, "*args")?;
        params.push(code.parameter(name, ParameterKind::VarPositional, None));
    }

    for name in keyword_only {
        let default = code.kw_defaults.get(name).cloned();
        params.push(code.parameter(name, ParameterKind::KeywordOnly, default));
    }

    if code.has_varkeywords() {
        let name = code.name_at(code.varkeywords_index()?, "**kwargs")?;
        params.push(code.parameter(name, ParameterKind::VarKeyword, None));
    }

    ParameterList::new(params)
}
