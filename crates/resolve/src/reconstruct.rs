//! Reconstruction code
//!
//! Renders serialized objects, calls and side effects as source text of the
//! subject language, together with the imports the text needs. Objects that
//! were given a variable name are referred to by it instead of being rebuilt.
//!
//! ## Usage
//!
//! ```
//! use testscope_core::{Execution, HostValue, Project};
//! use testscope_resolve::reconstruct::{constructor_as_string, AssignedNames};
//!
//! let mut execution = Execution::new(Project::new("/work/app").into_shared());
//! let list = execution.serialize(&HostValue::list(
//!     1,
//!     vec![HostValue::int(2, 1), HostValue::string(3, "two")],
//! ));
//! let code = constructor_as_string(&execution, list, &AssignedNames::new());
//! assert_eq!(code.code(), "[1, 'two']");
//! assert!(!code.is_uncomplete());
//! ```

use crate::dependencies::{Dependencies, Dependency};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use testscope_core::object::underscore;
use testscope_core::{
    Callable, ContainerOp, Execution, Import, ObjectId, ObjectKind, Project, SequenceObject,
    SideEffectId, SideEffectKind,
};

// ============================================================================
// CodeString
// ============================================================================

/// Piece of code with the imports it needs
///
/// `uncomplete` marks code containing a placeholder a human has to fill in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeString {
    code: String,
    imports: BTreeSet<Import>,
    uncomplete: bool,
}

impl CodeString {
    /// Complete code without imports
    pub fn new(code: impl Into<String>) -> Self {
        CodeString {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Complete code needing `imports`
    pub fn with_imports(code: impl Into<String>, imports: BTreeSet<Import>) -> Self {
        CodeString {
            code: code.into(),
            imports,
            uncomplete: false,
        }
    }

    /// `<TODO: value>` placeholder
    pub fn todo(value: &str) -> Self {
        CodeString {
            code: format!("<TODO: {}>", value),
            imports: BTreeSet::new(),
            uncomplete: true,
        }
    }

    /// The code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Imports the code needs
    pub fn imports(&self) -> &BTreeSet<Import> {
        &self.imports
    }

    /// Whether the code contains a placeholder
    pub fn is_uncomplete(&self) -> bool {
        self.uncomplete
    }

    /// Add an import
    pub fn add_import(mut self, import: Import) -> Self {
        self.imports.insert(import);
        self
    }

    /// Join pieces with `separator`, merging their imports
    pub fn join(separator: &str, parts: impl IntoIterator<Item = CodeString>) -> CodeString {
        let mut joined = CodeString::default();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                joined.code.push_str(separator);
            }
            joined.absorb(part);
        }
        joined
    }

    /// Put the code between `prefix` and `suffix`
    pub fn surround(mut self, prefix: &str, suffix: &str) -> CodeString {
        self.code = format!("{}{}{}", prefix, self.code, suffix);
        self
    }

    /// Substitute the code for the `%s` placeholder of `format`
    pub fn wrap(self, format: &str) -> CodeString {
        let (prefix, suffix) = format.split_once("%s").unwrap_or((format, ""));
        self.surround(prefix, suffix)
    }

    /// Put `other` after this code, merging imports and completeness
    fn absorb(&mut self, other: CodeString) {
        self.code.push_str(&other.code);
        self.imports.extend(other.imports);
        self.uncomplete |= other.uncomplete;
    }

    fn then(mut self, separator: &str, other: CodeString) -> CodeString {
        self.code.push_str(separator);
        self.absorb(other);
        self
    }
}

impl fmt::Display for CodeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

// ============================================================================
// Names
// ============================================================================

/// Variable names given to objects
#[derive(Debug, Clone, Default)]
pub struct AssignedNames {
    names: FxHashMap<ObjectId, String>,
}

impl AssignedNames {
    /// No names
    pub fn new() -> Self {
        Self::default()
    }

    /// Name each object after its type, numbering objects sharing a base
    ///
    /// A base used by a single object is used as is: `alist`. Several objects
    /// with the same base are numbered in creation order: `alist1`, `alist2`.
    pub fn assign(execution: &Execution, objects: &[ObjectId]) -> Self {
        let mut ordered = objects.to_vec();
        ordered.sort_by_key(|id| execution.object(*id).timestamp);
        ordered.dedup();

        let bases: Vec<String> = ordered.iter().map(|id| name_base(execution, *id)).collect();
        let mut totals: FxHashMap<&str, usize> = FxHashMap::default();
        for base in &bases {
            *totals.entry(base.as_str()).or_insert(0) += 1;
        }

        let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
        let mut names = FxHashMap::default();
        for (id, base) in ordered.iter().zip(&bases) {
            let name = if totals[base.as_str()] == 1 {
                base.clone()
            } else {
                let index = seen.entry(base.as_str()).or_insert(0);
                *index += 1;
                format!("{}{}", base, index)
            };
            names.insert(*id, name);
        }
        AssignedNames { names }
    }

    /// Name of an object
    pub fn get(&self, object: ObjectId) -> Option<&str> {
        self.names.get(&object).map(String::as_str)
    }

    /// Name an object
    pub fn insert(&mut self, object: ObjectId, name: impl Into<String>) {
        self.names.insert(object, name.into());
    }

    /// Number of named objects
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is named
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn name_base(execution: &Execution, id: ObjectId) -> String {
    let object = execution.object(id);
    let qualified = format!("{}.{}", object.module_name, object.type_name);
    match (object.type_name.as_str(), qualified.as_str()) {
        ("list", _) => "alist".to_string(),
        ("dict", _) => "adict".to_string(),
        (_, "array.array") => "array".to_string(),
        (_, "types.FunctionType") => "function".to_string(),
        (_, "types.GeneratorType") => "generator".to_string(),
        (type_name, _) => underscore(type_name),
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Code constructing an object, or its name if it has one
pub fn constructor_as_string(execution: &Execution, object: ObjectId, names: &AssignedNames) -> CodeString {
    let project = execution.project().read();
    let renderer = Renderer::new(execution, &project, names);
    renderer.constructor(object)
}

/// Code calling `callee` with captured arguments
///
/// `params` are the parameter names of the called definition, without a
/// bound receiver. Arguments follow the parameter order; once an argument is
/// missing the rest are passed by keyword. A `*args` tuple is spread and a
/// `**kwargs` map becomes keyword arguments unless they have names.
pub fn call_as_string_for(
    execution: &Execution,
    callee: &str,
    input: &BTreeMap<String, ObjectId>,
    params: &[String],
    names: &AssignedNames,
) -> CodeString {
    let project = execution.project().read();
    let renderer = Renderer::new(execution, &project, names);
    renderer.call(CodeString::new(callee), input, params)
}

/// Code replaying a side effect
pub fn side_effect_as_string(execution: &Execution, effect: SideEffectId, names: &AssignedNames) -> CodeString {
    let project = execution.project().read();
    let renderer = Renderer::new(execution, &project, names);
    renderer.side_effect(effect)
}

/// One line of setup code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupLine {
    /// Entry the line stands for
    pub dependency: Dependency,
    /// Variable assigned by the line
    pub name: Option<String>,
    /// Right-hand side, or the whole statement for side effects
    pub code: CodeString,
}

impl fmt::Display for SetupLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} = {}", name, self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

/// Setup code for resolved dependencies
#[derive(Debug, Clone, Default)]
pub struct Setup {
    /// Names given to the named dependencies
    pub names: AssignedNames,
    /// Lines in execution order
    pub lines: Vec<SetupLine>,
}

impl Setup {
    /// Imports needed by all lines
    pub fn imports(&self) -> BTreeSet<Import> {
        self.lines
            .iter()
            .flat_map(|line| line.code.imports().iter().cloned())
            .collect()
    }
}

/// Render the setup list of `dependencies`
pub fn setup_lines(execution: &Execution, dependencies: &Dependencies) -> Setup {
    let names = AssignedNames::assign(execution, dependencies.named());
    let project = execution.project().read();
    let renderer = Renderer::new(execution, &project, &names);

    let lines = dependencies
        .all()
        .iter()
        .map(|dependency| {
            let (name, code) = match dependency {
                Dependency::Object(id) => (names.get(*id), renderer.definition(*id)),
                Dependency::Sequence(seq) => {
                    let sequence = SequenceObject {
                        shape: seq.shape,
                        contained: seq.contained.clone(),
                    };
                    (names.get(seq.object), renderer.sequence(&sequence))
                }
                Dependency::SideEffect(id) => (None, renderer.side_effect(*id)),
            };
            SetupLine {
                dependency: dependency.clone(),
                name: name.map(str::to_string),
                code,
            }
        })
        .collect();

    Setup { names, lines }
}

struct Renderer<'a> {
    execution: &'a Execution,
    project: &'a Project,
    names: &'a AssignedNames,
}

impl<'a> Renderer<'a> {
    fn new(execution: &'a Execution, project: &'a Project, names: &'a AssignedNames) -> Self {
        Renderer {
            execution,
            project,
            names,
        }
    }

    fn constructor(&self, id: ObjectId) -> CodeString {
        match self.names.get(id) {
            Some(name) => CodeString::new(name),
            None => self.definition(id),
        }
    }

    /// Construction code ignoring the object's own name
    fn definition(&self, id: ObjectId) -> CodeString {
        let object = self.execution.object(id);
        match &object.kind {
            ObjectKind::Immutable(immutable) => {
                CodeString::with_imports(immutable.reconstructor.clone(), immutable.imports.clone())
            }
            ObjectKind::Sequence(sequence) => self.sequence(sequence),
            ObjectKind::Map(map) => {
                let pairs = map.mapping.iter().map(|(key, value)| {
                    self.constructor(*key).then(": ", self.constructor(*value))
                });
                CodeString::join(", ", pairs).surround("{", "}")
            }
            ObjectKind::Exception(exception) => {
                let args = exception.args.iter().map(|arg| self.constructor(*arg));
                let code = CodeString::join(", ", args).surround(&format!("{}(", object.type_name), ")");
                match object.type_import() {
                    Some(import) => code.add_import(import),
                    None => code,
                }
            }
            ObjectKind::Library(library) => {
                let args = library.args.iter().map(|arg| self.constructor(*arg));
                let mut code = CodeString::join(", ", args).wrap(&library.format);
                for import in &library.imports {
                    code = code.add_import(import.clone());
                }
                code
            }
            ObjectKind::User(user) => {
                let class = self.project.class(user.class);
                let code = match user.init_call {
                    Some(init) => {
                        let init = self.execution.call(init);
                        self.call(
                            CodeString::new(class.name.clone()),
                            &init.input,
                            self.project.call_args(init.definition),
                        )
                    }
                    None => CodeString::new(format!("{}()", class.name)),
                };
                code.add_import(Import::Name {
                    module: class.module.clone(),
                    name: class.name.clone(),
                })
            }
            ObjectKind::Generator(generator) => match &generator.activation {
                Some(activation) => {
                    let name = self.project.definition_name(activation.definition);
                    let params = self.project.call_args(activation.definition);
                    match activation.callable {
                        Callable::Function(_) => self
                            .call(CodeString::new(name), &activation.args, params)
                            .add_import(Import::Name {
                                module: self.project.definition_module(activation.definition).to_string(),
                                name: name.to_string(),
                            }),
                        Callable::UserObject(owner) => {
                            let callee = self.constructor(owner).surround("", &format!(".{}", name));
                            self.call(callee, &activation.args, params)
                        }
                    }
                }
                None => CodeString::todo("generator"),
            },
            ObjectKind::Unknown(unknown) => CodeString::todo(&unknown.partial_reconstructor),
        }
    }

    fn sequence(&self, sequence: &SequenceObject) -> CodeString {
        let items = sequence.contained.iter().map(|part| self.constructor(*part));
        let code = CodeString::join(", ", items).wrap(&sequence.constructor_format());
        match sequence.import() {
            Some(import) => code.add_import(import),
            None => code,
        }
    }

    fn call(&self, callee: CodeString, input: &BTreeMap<String, ObjectId>, params: &[String]) -> CodeString {
        let mut positional = Vec::new();
        let mut keyword = Vec::new();
        let mut vararg = None;
        let mut kwarg = None;
        let mut skipped_an_arg = false;

        for param in params {
            let value = match input.get(param.trim_start_matches('*')) {
                Some(value) => *value,
                None => {
                    skipped_an_arg = true;
                    continue;
                }
            };
            if param.starts_with("**") {
                match (self.names.get(value), self.keyword_arguments(value)) {
                    (Some(name), _) => kwarg = Some(CodeString::new(format!("**{}", name))),
                    (None, Some(arguments)) => keyword.extend(arguments),
                    (None, None) => kwarg = Some(self.constructor(value).surround("**", "")),
                }
            } else if param.starts_with('*') {
                let object = self.execution.object(value);
                match (self.names.get(value), &object.kind) {
                    (Some(name), _) => vararg = Some(CodeString::new(format!("*{}", name))),
                    (None, ObjectKind::Sequence(sequence)) => {
                        positional.extend(sequence.contained.iter().map(|part| self.constructor(*part)))
                    }
                    (None, _) => vararg = Some(self.constructor(value).surround("*", "")),
                }
            } else {
                let argument = self.constructor(value);
                if skipped_an_arg {
                    keyword.push(argument.surround(&format!("{}=", param), ""));
                } else {
                    positional.push(argument);
                }
            }
        }

        let arguments = CodeString::join(
            ", ",
            positional.into_iter().chain(keyword).chain(vararg).chain(kwarg),
        );
        callee.then("(", arguments).surround("", ")")
    }

    /// `name=value` pairs for a map keyed by strings, sorted by key
    fn keyword_arguments(&self, map: ObjectId) -> Option<Vec<CodeString>> {
        let mapping = match &self.execution.object(map).kind {
            ObjectKind::Map(m) => &m.mapping,
            _ => return None,
        };
        let mut pairs = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let key = match &self.execution.object(*key).kind {
                ObjectKind::Immutable(immutable) => string_literal_value(&immutable.reconstructor)?,
                _ => return None,
            };
            pairs.push((key, *value));
        }
        pairs.sort();
        Some(
            pairs
                .into_iter()
                .map(|(key, value)| self.constructor(value).surround(&format!("{}=", key), ""))
                .collect(),
        )
    }

    fn side_effect(&self, id: SideEffectId) -> CodeString {
        match &self.execution.side_effect(id).kind {
            SideEffectKind::ContainerMutation { op, receiver, args } => {
                let receiver = self.constructor(*receiver);
                match (op, args.as_slice()) {
                    (ContainerOp::DictSetItem, [key, value]) => receiver
                        .then("[", self.constructor(*key))
                        .then("] = ", self.constructor(*value)),
                    (ContainerOp::DictDelItem, [key]) => {
                        receiver.then("[", self.constructor(*key)).surround("del ", "]")
                    }
                    _ => {
                        let args = CodeString::join(", ", args.iter().map(|arg| self.constructor(*arg)));
                        receiver
                            .surround("", &format!(".{}(", op.method_name()))
                            .then("", args)
                            .surround("", ")")
                    }
                }
            }
            SideEffectKind::GlobalRead { module, name, .. } => {
                CodeString::new(format!("{}.{}", module, name)).add_import(Import::Module(module.clone()))
            }
            SideEffectKind::GlobalRebind { module, name, value } => {
                CodeString::new(format!("{}.{} = ", module, name))
                    .add_import(Import::Module(module.clone()))
                    .then("", self.constructor(*value))
            }
            SideEffectKind::AttributeRebind { target, name, value } => self
                .constructor(*target)
                .then(&format!(".{} = ", name), self.constructor(*value)),
        }
    }
}

/// Value of a quoted string literal holding a plain identifier
fn string_literal_value(literal: &str) -> Option<String> {
    let quote = literal.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let inner = literal.strip_prefix(quote)?.strip_suffix(quote)?;
    let identifier = !inner.is_empty()
        && inner.chars().all(|c| c == '_' || c.is_alphanumeric())
        && !inner.starts_with(|c: char| c.is_ascii_digit());
    identifier.then(|| inner.to_string())
}

// ============================================================================
// Tests
// ============================================================================
