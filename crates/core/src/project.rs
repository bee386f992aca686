//! Static definitions registry
//!
//! The project is what the static analysis collaborator knows about the
//! subject program: which functions and classes exist, in which module, and
//! with which parameters. The capture engine consults it to decide whether an
//! observed call is worth recording, and links every captured fact back to
//! the definition it belongs to.
//!
//! Links carry the [`ExecutionId`] of the run that produced them, so one run
//! can be erased with [`Project::forget_execution`] without touching others.

use crate::ids::{CallId, ClassId, ExecutionId, FunctionId, MethodId, ObjectId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Project shared between the capture controller and its callers
pub type SharedProject = Arc<RwLock<Project>>;

/// Name of the constructor method
pub const CONSTRUCTOR_NAME: &str = "__init__";

/// File stem of a package's own module
const PACKAGE_MODULE: &str = "__init__";

/// Captured fact linked from a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureTarget {
    /// A captured call
    Call(CallId),
    /// A generator object created by calling a generator definition
    Generator(ObjectId),
    /// An instance of a class
    UserObject(ObjectId),
}

/// Link from a definition to a fact captured during one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRef {
    /// Execution that captured the fact
    pub execution: ExecutionId,
    /// The captured fact
    pub target: CaptureTarget,
}

/// Module-level function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Dotted module path
    pub module: String,
    /// Parameter names; `*name` / `**name` mark variadic parameters
    pub args: Vec<String>,
    /// Whether calling it produces a generator
    pub is_generator: bool,
    /// Captured calls and generator objects
    pub calls: Vec<CaptureRef>,
}

/// Method of a class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    /// Method name
    pub name: String,
    /// Parameter names, including the bound receiver first
    pub args: Vec<String>,
    /// Whether calling it produces a generator
    pub is_generator: bool,
}

impl Method {
    /// Regular method
    pub fn new(name: impl Into<String>, args: &[&str]) -> Self {
        Method {
            name: name.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            is_generator: false,
        }
    }

    /// Generator method
    pub fn generator(name: impl Into<String>, args: &[&str]) -> Self {
        Method {
            is_generator: true,
            ..Self::new(name, args)
        }
    }

    /// Whether this is the constructor
    pub fn is_creational(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }
}

/// Class with its methods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    /// Class name
    pub name: String,
    /// Dotted module path
    pub module: String,
    /// Declared methods
    pub methods: Vec<Method>,
    /// Base classes known to the project, in resolution order
    #[serde(default)]
    pub bases: Vec<ClassId>,
    /// Captured instances
    pub user_objects: Vec<CaptureRef>,
}

/// Static definition a call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Definition {
    /// Module-level function
    Function(FunctionId),
    /// Method of a class
    Method(MethodId),
}

/// Registry of the subject program's definitions
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    functions: Vec<Function>,
    classes: Vec<Class>,
}

impl Project {
    /// Create an empty project rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Project {
            root: root.into(),
            functions: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Wrap into the shared form used by the capture engine
    pub fn into_shared(self) -> SharedProject {
        Arc::new(RwLock::new(self))
    }

    /// Root directory of the subject program
    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a function
    pub fn add_function(&mut self, module: &str, name: &str, args: &[&str]) -> FunctionId {
        self.push_function(module, name, args, false)
    }

    /// Register a generator function
    pub fn add_generator_function(&mut self, module: &str, name: &str, args: &[&str]) -> FunctionId {
        self.push_function(module, name, args, true)
    }

    fn push_function(&mut self, module: &str, name: &str, args: &[&str], is_generator: bool) -> FunctionId {
        let id = FunctionId::new(self.functions.len() as u32);
        self.functions.push(Function {
            name: name.to_string(),
            module: module.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            is_generator,
            calls: Vec::new(),
        });
        id
    }

    /// Register a class with its methods
    pub fn add_class(&mut self, module: &str, name: &str, methods: Vec<Method>) -> ClassId {
        let id = ClassId::new(self.classes.len() as u32);
        self.classes.push(Class {
            name: name.to_string(),
            module: module.to_string(),
            methods,
            bases: Vec::new(),
            user_objects: Vec::new(),
        });
        id
    }

    /// Register a class deriving from `bases`
    pub fn add_subclass(&mut self, module: &str, name: &str, bases: &[ClassId], methods: Vec<Method>) -> ClassId {
        let id = self.add_class(module, name, methods);
        self.classes[id.index()].bases = bases.to_vec();
        id
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Find a function by name and module
    pub fn find_function(&self, name: &str, module: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.name == name && f.module == module)
            .map(|i| FunctionId::new(i as u32))
    }

    /// Find a class by name and module
    pub fn find_class(&self, name: &str, module: &str) -> Option<ClassId> {
        self.classes
            .iter()
            .position(|c| c.name == name && c.module == module)
            .map(|i| ClassId::new(i as u32))
    }

    /// Find a method of `class` by name, looking through its bases
    ///
    /// Bases are searched depth first in declaration order.
    pub fn find_method(&self, class: ClassId, name: &str) -> Option<MethodId> {
        let mut visited = Vec::new();
        let mut pending = vec![class];
        while let Some(class) = pending.pop() {
            if visited.contains(&class) {
                continue;
            }
            visited.push(class);
            let c = self.classes.get(class.index())?;
            if let Some(i) = c.methods.iter().position(|m| m.name == name) {
                return Some(MethodId {
                    class,
                    index: i as u32,
                });
            }
            pending.extend(c.bases.iter().rev().copied());
        }
        None
    }

    /// Function by id
    ///
    /// # Panics
    ///
    /// Panics if the id was not produced by this project.
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    /// Class by id
    ///
    /// # Panics
    ///
    /// Panics if the id was not produced by this project.
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    /// Method by id
    ///
    /// # Panics
    ///
    /// Panics if the id was not produced by this project.
    pub fn method(&self, id: MethodId) -> &Method {
        &self.classes[id.class.index()].methods[id.index as usize]
    }

    /// All registered functions
    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId::new(i as u32), f))
    }

    /// All registered classes
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &Class)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (ClassId::new(i as u32), c))
    }

    /// Name of a definition
    pub fn definition_name(&self, definition: Definition) -> &str {
        match definition {
            Definition::Function(id) => &self.function(id).name,
            Definition::Method(id) => &self.method(id).name,
        }
    }

    /// Parameter names of a definition, without a method's bound receiver
    pub fn call_args(&self, definition: Definition) -> &[String] {
        match definition {
            Definition::Function(id) => &self.function(id).args,
            Definition::Method(id) => {
                let args = &self.method(id).args;
                if args.is_empty() {
                    args
                } else {
                    &args[1..]
                }
            }
        }
    }

    /// Module a definition lives in
    pub fn definition_module(&self, definition: Definition) -> &str {
        match definition {
            Definition::Function(id) => &self.function(id).module,
            Definition::Method(id) => &self.class(id.class).module,
        }
    }

    // =========================================================================
    // Paths
    // =========================================================================

    /// Whether `path` lies inside the project root
    pub fn contains_path(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Dotted module name for a file inside the project
    ///
    /// `<root>/pkg/mod.py` maps to `pkg.mod` and `<root>/pkg/__init__.py` to
    /// `pkg`. Returns `None` for files outside the root.
    pub fn module_for_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let stem = relative.with_extension("");
        let mut parts: Vec<String> = stem
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.last().map_or(false, |last| last == PACKAGE_MODULE) {
            parts.pop();
        }
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("."))
    }

    // =========================================================================
    // Capture links
    // =========================================================================

    /// Link a captured call or generator object to its function
    pub fn link_function_capture(&mut self, id: FunctionId, capture: CaptureRef) {
        if let Some(function) = self.functions.get_mut(id.index()) {
            function.calls.push(capture);
        }
    }

    /// Link a captured instance to its class
    pub fn link_user_object(&mut self, id: ClassId, capture: CaptureRef) {
        if let Some(class) = self.classes.get_mut(id.index()) {
            class.user_objects.push(capture);
        }
    }

    /// Remove every link created by one execution
    pub fn forget_execution(&mut self, execution: ExecutionId) {
        for function in &mut self.functions {
            function.calls.retain(|c| c.execution != execution);
        }
        for class in &mut self.classes {
            class.user_objects.retain(|c| c.execution != execution);
        }
    }
}
