//! Host runtime value model
//!
//! The capture engine never touches the subject program's values directly.
//! A host adapter hands it [`HostValue`]s: reference-counted views carrying a
//! stable [`Handle`], type information and a classification ([`HostKind`]).
//! Holding a `HostValue` keeps the underlying host object alive, which is how
//! an execution keeps handles from being recycled until it is finalized.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-object ownership token assigned by the host at first observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    /// Bit reserved for values synthesized by the engine itself
    const SYNTHETIC_BIT: u64 = 1 << 63;

    /// Handle reported by the host
    pub const fn new(raw: u64) -> Self {
        Handle(raw & !Self::SYNTHETIC_BIT)
    }

    /// Handle for a value the engine had to build (never collides with host handles)
    pub const fn synthetic(seq: u64) -> Self {
        Handle(seq | Self::SYNTHETIC_BIT)
    }

    /// Raw value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// True for engine-built values
    pub const fn is_synthetic(&self) -> bool {
        self.0 & Self::SYNTHETIC_BIT != 0
    }
}

/// Identity of one executable code unit (function body, method body, module body)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CodeId(pub u64);

/// Static description of a code unit, as reported with each frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeInfo {
    /// Code identity
    pub id: CodeId,
    /// Name the code was defined under (`<module>` for module bodies)
    pub name: String,
    /// File the code was loaded from
    pub filename: String,
    /// Code of a resumable (generator) function
    pub is_generator: bool,
    /// Code executing a class body
    pub is_class_body: bool,
}

impl CodeInfo {
    /// Plain function or method body
    pub fn function(id: u64, name: impl Into<String>, filename: impl Into<String>) -> Self {
        CodeInfo {
            id: CodeId(id),
            name: name.into(),
            filename: filename.into(),
            is_generator: false,
            is_class_body: false,
        }
    }

    /// Generator function body
    pub fn generator(id: u64, name: impl Into<String>, filename: impl Into<String>) -> Self {
        CodeInfo {
            is_generator: true,
            ..Self::function(id, name, filename)
        }
    }

    /// Class body
    pub fn class_body(id: u64, name: impl Into<String>, filename: impl Into<String>) -> Self {
        CodeInfo {
            is_class_body: true,
            ..Self::function(id, name, filename)
        }
    }
}

/// Container shape of a sequence value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceShape {
    /// Mutable ordered list
    List,
    /// Immutable ordered tuple
    Tuple,
    /// Mutable unordered set
    Set,
    /// Immutable unordered set
    FrozenSet,
    /// Typed numeric array with its element type code, e.g. `'i'`
    Array(char),
}

impl SequenceShape {
    /// Builtin type name of the shape
    pub fn type_name(&self) -> &'static str {
        match self {
            SequenceShape::List => "list",
            SequenceShape::Tuple => "tuple",
            SequenceShape::Set => "set",
            SequenceShape::FrozenSet => "frozenset",
            SequenceShape::Array(_) => "array",
        }
    }
}

/// Value with a context-independent literal syntax
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Null value
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text string
    Str(String),
    /// Compiled regular expression with its flag names (e.g. `IGNORECASE`)
    Pattern {
        /// Source pattern
        pattern: String,
        /// Flag names
        flags: Vec<String>,
    },
    /// Named (non-anonymous) function, reconstructible by import
    Function {
        /// Function name
        name: String,
        /// Defining module
        module: String,
    },
}

/// Liveness of a resumable call, shared with the host
///
/// The host releases the frame once the generator is exhausted.
#[derive(Debug, Clone, Default)]
pub struct GeneratorFrame {
    released: Arc<AtomicBool>,
}

impl GeneratorFrame {
    /// Frame of a live generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the generator as exhausted
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
    }

    /// Whether the host released the frame
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

/// Classification view of a host value
#[derive(Debug, Clone)]
pub enum HostKind {
    /// Literal value
    Literal(Literal),
    /// Ordered or unordered builtin container
    Sequence {
        /// Container shape
        shape: SequenceShape,
        /// Contents in iteration order
        items: Vec<HostValue>,
    },
    /// Builtin key/value mapping
    Map {
        /// Key/value pairs in iteration order
        entries: Vec<(HostValue, HostValue)>,
    },
    /// Exception instance
    Exception {
        /// Constructor arguments
        args: Vec<HostValue>,
        /// Whether the type is one of the runtime's builtin exceptions
        builtin: bool,
    },
    /// Resumable call
    Generator(GeneratorFrame),
    /// Instance of a library type rebuilt from some of its attributes
    Library {
        /// Attribute values by name
        attributes: Vec<(String, HostValue)>,
    },
    /// Instance of some class
    Instance,
    /// Anything else
    Opaque,
}

/// An object living in the host runtime
#[derive(Debug)]
pub struct HostObject {
    /// Identity token
    pub handle: Handle,
    /// Name of the object's type
    pub type_name: String,
    /// Module the type was defined in
    pub module: String,
    /// Classification view
    pub kind: HostKind,
    /// Methods bound on this object, with the code implementing each
    pub methods: Vec<(String, CodeId)>,
}

/// Shared handle to a host object
#[derive(Debug, Clone)]
pub struct HostValue(Arc<HostObject>);

/// Module name of builtin types
pub const BUILTIN_MODULE: &str = "builtins";

impl HostValue {
    /// Wrap a host object
    pub fn new(object: HostObject) -> Self {
        HostValue(Arc::new(object))
    }

    fn builtin(handle: u64, type_name: &str, kind: HostKind) -> Self {
        Self::new(HostObject {
            handle: Handle::new(handle),
            type_name: type_name.to_string(),
            module: BUILTIN_MODULE.to_string(),
            kind,
            methods: Vec::new(),
        })
    }

    /// Null value
    pub fn none(handle: u64) -> Self {
        Self::builtin(handle, "NoneType", HostKind::Literal(Literal::None))
    }

    /// Boolean value
    pub fn boolean(handle: u64, value: bool) -> Self {
        Self::builtin(handle, "bool", HostKind::Literal(Literal::Bool(value)))
    }

    /// Integer value
    pub fn int(handle: u64, value: i64) -> Self {
        Self::builtin(handle, "int", HostKind::Literal(Literal::Int(value)))
    }

    /// Float value
    pub fn float(handle: u64, value: f64) -> Self {
        Self::builtin(handle, "float", HostKind::Literal(Literal::Float(value)))
    }

    /// String value
    pub fn string(handle: u64, value: impl Into<String>) -> Self {
        Self::builtin(handle, "str", HostKind::Literal(Literal::Str(value.into())))
    }

    /// Compiled pattern
    pub fn pattern(handle: u64, pattern: impl Into<String>, flags: &[&str]) -> Self {
        Self::new(HostObject {
            handle: Handle::new(handle),
            type_name: "Pattern".to_string(),
            module: "re".to_string(),
            kind: HostKind::Literal(Literal::Pattern {
                pattern: pattern.into(),
                flags: flags.iter().map(|f| f.to_string()).collect(),
            }),
            methods: Vec::new(),
        })
    }

    /// Named function defined in `module`
    pub fn function(handle: u64, name: impl Into<String>, module: impl Into<String>) -> Self {
        Self::builtin(
            handle,
            "function",
            HostKind::Literal(Literal::Function {
                name: name.into(),
                module: module.into(),
            }),
        )
    }

    /// Sequence of the given shape
    pub fn sequence(handle: u64, shape: SequenceShape, items: Vec<HostValue>) -> Self {
        Self::builtin(handle, shape.type_name(), HostKind::Sequence { shape, items })
    }

    /// List value
    pub fn list(handle: u64, items: Vec<HostValue>) -> Self {
        Self::sequence(handle, SequenceShape::List, items)
    }

    /// Tuple value
    pub fn tuple(handle: u64, items: Vec<HostValue>) -> Self {
        Self::sequence(handle, SequenceShape::Tuple, items)
    }

    /// Typed array from the `array` module
    pub fn array(handle: u64, typecode: char, items: Vec<HostValue>) -> Self {
        Self::new(HostObject {
            handle: Handle::new(handle),
            type_name: "array".to_string(),
            module: "array".to_string(),
            kind: HostKind::Sequence {
                shape: SequenceShape::Array(typecode),
                items,
            },
            methods: Vec::new(),
        })
    }

    /// Map value
    pub fn map(handle: u64, entries: Vec<(HostValue, HostValue)>) -> Self {
        Self::builtin(handle, "dict", HostKind::Map { entries })
    }

    /// Builtin exception
    pub fn exception(handle: u64, type_name: impl Into<String>, args: Vec<HostValue>) -> Self {
        Self::new(HostObject {
            handle: Handle::new(handle),
            type_name: type_name.into(),
            module: BUILTIN_MODULE.to_string(),
            kind: HostKind::Exception {
                args,
                builtin: true,
            },
            methods: Vec::new(),
        })
    }

    /// Generator object
    pub fn generator(handle: u64, frame: GeneratorFrame) -> Self {
        Self::builtin(handle, "generator", HostKind::Generator(frame))
    }

    /// Instance of class `type_name` defined in `module`
    pub fn instance(
        handle: u64,
        type_name: impl Into<String>,
        module: impl Into<String>,
        methods: Vec<(String, CodeId)>,
    ) -> Self {
        Self::new(HostObject {
            handle: Handle::new(handle),
            type_name: type_name.into(),
            module: module.into(),
            kind: HostKind::Instance,
            methods,
        })
    }

    /// Library instance described by its attributes
    ///
    /// Only types the engine knows how to rebuild make use of the attributes;
    /// any other library type is treated like an opaque value.
    pub fn library(
        handle: u64,
        type_name: impl Into<String>,
        module: impl Into<String>,
        attributes: Vec<(&str, HostValue)>,
    ) -> Self {
        Self::new(HostObject {
            handle: Handle::new(handle),
            type_name: type_name.into(),
            module: module.into(),
            kind: HostKind::Library {
                attributes: attributes
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
            },
            methods: Vec::new(),
        })
    }

    /// Value the engine cannot look into
    pub fn opaque(handle: u64, type_name: impl Into<String>, module: impl Into<String>) -> Self {
        Self::new(HostObject {
            handle: Handle::new(handle),
            type_name: type_name.into(),
            module: module.into(),
            kind: HostKind::Opaque,
            methods: Vec::new(),
        })
    }

    /// Identity token
    pub fn handle(&self) -> Handle {
        self.0.handle
    }

    /// Type name
    pub fn type_name(&self) -> &str {
        &self.0.type_name
    }

    /// Defining module of the type
    pub fn module(&self) -> &str {
        &self.0.module
    }

    /// Classification view
    pub fn kind(&self) -> &HostKind {
        &self.0.kind
    }

    /// Code of the method bound on this object under `name`
    pub fn method_code(&self, name: &str) -> Option<CodeId> {
        self.0
            .methods
            .iter()
            .find(|(method, _)| method == name)
            .map(|(_, code)| *code)
    }

    /// Items of a sequence value
    pub fn sequence_items(&self) -> Option<&[HostValue]> {
        match &self.0.kind {
            HostKind::Sequence { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Attribute of a library value
    pub fn attribute(&self, name: &str) -> Option<&HostValue> {
        match &self.0.kind {
            HostKind::Library { attributes } => attributes
                .iter()
                .find(|(attribute, _)| attribute == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// True if both views refer to the same host object
    pub fn same_object(&self, other: &HostValue) -> bool {
        self.handle() == other.handle()
    }
}
