//! Serialized objects
//!
//! A [`SerializedObject`] is an immutable, comparable description of one
//! runtime value, detached from the value itself. Composite descriptors refer
//! to their parts by [`ObjectId`], so the object graph of an execution lives
//! in the execution's arena and identity is expressed by id equality.
//!
//! ## Variants
//!
//! - `Immutable`: literal reconstruction expression plus imports
//! - `Sequence` / `Map` / `Exception`: builtin composites
//! - `Library`: known library type rebuilt from some of its attributes
//! - `Unknown`: opaque value with a comment-only hint
//! - `User`: instance of a project class, rebuilt from its constructor call
//! - `Generator`: resumable call, possibly not activated yet

use crate::host::{Literal, SequenceShape, BUILTIN_MODULE};
use crate::ids::{CallId, ClassId, FunctionId, ObjectId};
use crate::project::Definition;
use crate::timeline::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Import required by a reconstruction expression
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Import {
    /// `import module`
    Module(String),
    /// `from module import name`
    Name {
        /// Source module
        module: String,
        /// Imported name
        name: String,
    },
}

/// Value whose identity does not matter and which has a literal form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmutableObject {
    /// Code constructing the value
    pub reconstructor: String,
    /// Imports the reconstructor needs
    pub imports: BTreeSet<Import>,
}

impl ImmutableObject {
    /// Reconstruction of a literal
    pub fn from_literal(literal: &Literal) -> Self {
        let (reconstructor, imports) = match literal {
            Literal::None => ("None".to_string(), BTreeSet::new()),
            Literal::Bool(true) => ("True".to_string(), BTreeSet::new()),
            Literal::Bool(false) => ("False".to_string(), BTreeSet::new()),
            Literal::Int(i) => (i.to_string(), BTreeSet::new()),
            Literal::Float(f) => (float_repr(*f), BTreeSet::new()),
            Literal::Str(s) => (string_repr(s), BTreeSet::new()),
            Literal::Pattern { pattern, flags } => {
                let code = if flags.is_empty() {
                    format!("re.compile({})", string_repr(pattern))
                } else {
                    let flags: Vec<String> = flags.iter().map(|f| format!("re.{}", f)).collect();
                    format!("re.compile({}, {})", string_repr(pattern), flags.join(" | "))
                };
                (code, BTreeSet::from([Import::Module("re".to_string())]))
            }
            Literal::Function { name, module } => (
                name.clone(),
                BTreeSet::from([Import::Name {
                    module: module.clone(),
                    name: name.clone(),
                }]),
            ),
        };
        ImmutableObject {
            reconstructor,
            imports,
        }
    }

    /// Whether this is the null literal
    pub fn is_none(&self) -> bool {
        self.reconstructor == "None" && self.imports.is_empty()
    }
}

/// Ordered contents in one of the builtin container shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceObject {
    /// Container shape
    pub shape: SequenceShape,
    /// Contents in order
    pub contained: Vec<ObjectId>,
}

impl SequenceObject {
    /// Format string with one `%s` placeholder for the comma separated contents
    pub fn constructor_format(&self) -> String {
        match self.shape {
            SequenceShape::List => "[%s]".to_string(),
            SequenceShape::Tuple if self.contained.len() == 1 => "(%s,)".to_string(),
            SequenceShape::Tuple => "(%s)".to_string(),
            SequenceShape::Set => "set([%s])".to_string(),
            SequenceShape::FrozenSet => "frozenset([%s])".to_string(),
            SequenceShape::Array(typecode) => format!("array.array('{}', [%s])", typecode),
        }
    }

    /// Import the constructor format needs
    pub fn import(&self) -> Option<Import> {
        match self.shape {
            SequenceShape::Array(_) => Some(Import::Module("array".to_string())),
            _ => None,
        }
    }
}

/// Key/value pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapObject {
    /// Pairs in iteration order
    pub mapping: Vec<(ObjectId, ObjectId)>,
}

/// Instance of a builtin exception type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionObject {
    /// Constructor arguments
    pub args: Vec<ObjectId>,
}

/// Library type the engine knows how to rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryType {
    /// Defining module
    pub module: &'static str,
    /// Type name
    pub name: &'static str,
    /// Constructor format with one `%s` placeholder for the arguments
    pub format: &'static str,
    /// Attributes passed to the constructor, in order
    pub arguments: &'static [&'static str],
    /// Whether the format refers to the type through its module
    pub module_import: bool,
}

impl LibraryType {
    /// Import the constructor format needs
    pub fn import(&self) -> Import {
        if self.module_import {
            Import::Module(self.module.to_string())
        } else {
            Import::Name {
                module: self.module.to_string(),
                name: self.name.to_string(),
            }
        }
    }
}

/// Library types rebuilt from their attributes
pub const LIBRARY_TYPES: &[LibraryType] = &[
    LibraryType {
        module: "xml.dom.minidom",
        name: "Element",
        format: "Element(%s)",
        arguments: &["tagName", "namespaceURI", "prefix"],
        module_import: false,
    },
    LibraryType {
        module: "datetime",
        name: "datetime",
        format: "datetime.datetime(%s)",
        arguments: &[
            "year",
            "month",
            "day",
            "hour",
            "minute",
            "second",
            "microsecond",
            "tzinfo",
        ],
        module_import: true,
    },
];

/// Known library type defined as `name` in `module`
pub fn library_type(module: &str, name: &str) -> Option<&'static LibraryType> {
    LIBRARY_TYPES
        .iter()
        .find(|ty| ty.module == module && ty.name == name)
}

/// Instance of a known library type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryObject {
    /// Constructor format with one `%s` placeholder for the arguments
    pub format: String,
    /// Constructor arguments
    pub args: Vec<ObjectId>,
    /// Imports the format needs
    pub imports: BTreeSet<Import>,
}

/// Value that cannot be recreated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownObject {
    /// Hint for a human completing the test, e.g. `socket.socket`
    pub partial_reconstructor: String,
}

/// Call made on a user object, or a generator produced by one of its methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Invocation {
    /// A method call
    Call(CallId),
    /// A generator object returned by a generator method
    Generator(ObjectId),
}

/// Instance of a project class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserObject {
    /// Class of the instance
    pub class: ClassId,
    /// Constructor call, once observed
    pub init_call: Option<CallId>,
    /// Method calls and generators, in capture order (constructor included)
    pub calls: Vec<Invocation>,
}

impl UserObject {
    /// Method calls other than the constructor
    pub fn external_calls(&self) -> impl Iterator<Item = &Invocation> {
        let init = self.init_call;
        self.calls
            .iter()
            .filter(move |inv| !matches!(inv, Invocation::Call(c) if Some(*c) == init))
    }
}

/// What a generator was obtained from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Callable {
    /// Module-level generator function
    Function(FunctionId),
    /// Generator method bound on a user object
    UserObject(ObjectId),
}

/// Arguments a generator was created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorActivation {
    /// Generator function or method
    pub definition: Definition,
    /// Serialized call arguments
    pub args: BTreeMap<String, ObjectId>,
    /// Function or receiver the generator came from
    pub callable: Callable,
}

/// Resumable call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorObject {
    /// Set on the first observed resumption
    pub activation: Option<GeneratorActivation>,
    /// One invocation per resumption, in order
    pub calls: Vec<CallId>,
}

impl GeneratorObject {
    /// Whether the originating call is known
    pub fn is_activated(&self) -> bool {
        self.activation.is_some()
    }
}

/// Variant-specific part of a serialized object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Literal value
    Immutable(ImmutableObject),
    /// Builtin sequence
    Sequence(SequenceObject),
    /// Builtin mapping
    Map(MapObject),
    /// Builtin exception
    Exception(ExceptionObject),
    /// Known library type
    Library(LibraryObject),
    /// Opaque value
    Unknown(UnknownObject),
    /// Instance of a project class
    User(UserObject),
    /// Resumable call
    Generator(GeneratorObject),
}

/// Captured description of one runtime value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedObject {
    /// Arena id (identity within the execution)
    pub id: ObjectId,
    /// Creation order
    pub timestamp: Timestamp,
    /// Short token derived from the value, used for naming
    pub human_readable_id: String,
    /// Type of the value
    pub type_name: String,
    /// Module the type was defined in
    pub module_name: String,
    /// Variant data
    pub kind: ObjectKind,
}

impl SerializedObject {
    /// Import that brings the object's type into scope, if it is not builtin
    pub fn type_import(&self) -> Option<Import> {
        if self.module_name == BUILTIN_MODULE || self.module_name.is_empty() {
            return None;
        }
        Some(Import::Name {
            module: self.module_name.clone(),
            name: self.type_name.clone(),
        })
    }

    /// Whether this is an `ImmutableObject`
    pub fn is_immutable(&self) -> bool {
        matches!(self.kind, ObjectKind::Immutable(_))
    }

    /// Whether this is the null literal
    pub fn is_none(&self) -> bool {
        matches!(&self.kind, ObjectKind::Immutable(i) if i.is_none())
    }

    /// User-object view
    pub fn as_user(&self) -> Option<&UserObject> {
        match &self.kind {
            ObjectKind::User(u) => Some(u),
            _ => None,
        }
    }

    /// Generator view
    pub fn as_generator(&self) -> Option<&GeneratorObject> {
        match &self.kind {
            ObjectKind::Generator(g) => Some(g),
            _ => None,
        }
    }

    /// Sequence view
    pub fn as_sequence(&self) -> Option<&SequenceObject> {
        match &self.kind {
            ObjectKind::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Direct parts of a builtin composite, in reconstruction order
    pub fn parts(&self) -> Vec<ObjectId> {
        match &self.kind {
            ObjectKind::Sequence(s) => s.contained.clone(),
            ObjectKind::Map(m) => m.mapping.iter().flat_map(|(k, v)| [*k, *v]).collect(),
            ObjectKind::Exception(e) => e.args.clone(),
            ObjectKind::Library(l) => l.args.clone(),
            _ => Vec::new(),
        }
    }
}

/// Shallow equality: the arena id and timestamp never participate, and
/// unknown objects are never equal to anything. Composites are equal when
/// they hold the very same parts; [`Execution::content_eq`] compares the
/// parts by content.
///
/// [`Execution::content_eq`]: crate::Execution::content_eq
impl PartialEq for SerializedObject {
    fn eq(&self, other: &Self) -> bool {
        if self.type_name != other.type_name {
            return false;
        }
        match (&self.kind, &other.kind) {
            (ObjectKind::Immutable(a), ObjectKind::Immutable(b)) => a == b,
            (ObjectKind::Sequence(a), ObjectKind::Sequence(b)) => a == b,
            (ObjectKind::Map(a), ObjectKind::Map(b)) => a == b,
            (ObjectKind::Exception(a), ObjectKind::Exception(b)) => a == b,
            (ObjectKind::Library(a), ObjectKind::Library(b)) => a == b,
            (ObjectKind::User(a), ObjectKind::User(b)) => a == b,
            (ObjectKind::Generator(a), ObjectKind::Generator(b)) => a == b,
            _ => false,
        }
    }
}

// =============================================================================
// Naming helpers
// =============================================================================

/// Convert `CamelCase` into `camel_case`
///
/// Runs of capitals are kept together: `BigHTMLClass` becomes `big_html_class`.
pub fn underscore(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
                if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
                {
                    out.push('_');
                }
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Remove every character that cannot appear in an identifier
///
/// Whitespace runs become a single underscore.
pub fn string2id(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_whitespace = false;
    for c in s.trim().chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        }
    }
    out
}

/// Literal form of a string, quoted the way the subject language prints it
pub fn string_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn float_repr(f: f64) -> String {
    if f.is_nan() {
        "float('nan')".to_string()
    } else if f.is_infinite() {
        if f > 0.0 {
            "float('inf')".to_string()
        } else {
            "float('-inf')".to_string()
        }
    } else {
        format!("{:?}", f)
    }
}
