// src/core/tree.rs

use crate::core::argument::{ArgumentDeclarationError, ArgumentDescriptor};
use crate::core::command::Constructor;
use crate::core::commons::{first_line, normalize_indent};
use crate::core::merger::{ArgumentBundle, merge_arguments, validate_exclusive};
use crate::core::registry::{Registered, RegistrationError, Registry};
use crate::models::{ArgumentSpec, CommandName};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref COMMAND_NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap();
}

/// Errors raised while the command tree is built. Both kinds point at a bug
/// in a command definition and abort startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("Invalid arguments for command '{command}': {source}")]
    Declaration {
        command: String,
        #[source]
        source: ArgumentDeclarationError,
    },
}

// --- DECLARATION ---

/// What a declared command is.
#[derive(Debug, Clone, Copy)]
pub enum CommandKind {
    /// A runnable command, built by its constructor.
    Leaf(Constructor),
    /// A command whose only role is selecting one of its children.
    Dispatcher,
    /// A base that is never registered; other commands reuse its arguments
    /// through [`CommandDescriptor::extends`].
    Abstract,
}

/// Static description of a command, collected by the bootstrap step and
/// turned into a [`CommandNode`] when registered.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub name: Option<CommandName>,
    pub aliases: Vec<String>,
    /// Path of the parent dispatcher below the root, by name or alias.
    /// Empty for children of the root.
    pub parent: Vec<String>,
    pub help: Option<String>,
    pub help_short: Option<String>,
    pub doc: Option<String>,
    pub module: String,
    pub module_doc: Option<String>,
    /// Inherited bundles, most general first.
    pub bundles: Vec<ArgumentBundle>,
    /// Arguments declared by this command itself.
    pub arguments: ArgumentBundle,
    pub exclusive: Vec<Vec<String>>,
    pub kind: CommandKind,
}

impl CommandDescriptor {
    fn with_kind(kind: CommandKind) -> Self {
        Self {
            name: None,
            aliases: Vec::new(),
            parent: Vec::new(),
            help: None,
            help_short: None,
            doc: None,
            module: String::new(),
            module_doc: None,
            bundles: Vec::new(),
            arguments: ArgumentBundle::default(),
            exclusive: Vec::new(),
            kind,
        }
    }

    pub fn leaf(constructor: Constructor) -> Self {
        Self::with_kind(CommandKind::Leaf(constructor))
    }

    pub fn dispatcher() -> Self {
        Self::with_kind(CommandKind::Dispatcher)
    }

    pub fn abstract_base() -> Self {
        Self::with_kind(CommandKind::Abstract)
    }

    /// The top-level dispatcher.
    pub fn root() -> Self {
        let mut descriptor = Self::dispatcher();
        descriptor.name = Some(CommandName::Root);
        descriptor
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(CommandName::Named(name.into()));
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Places the command under a nested dispatcher, given as a
    /// space-separated path of names (`"db backup"`).
    pub fn parent(mut self, path: &str) -> Self {
        self.parent = path.split_whitespace().map(str::to_string).collect();
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn help_short(mut self, help_short: impl Into<String>) -> Self {
        self.help_short = Some(help_short.into());
        self
    }

    /// The command's documentation, used for help when none is set explicitly.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// The declaring module, usually `module_path!()`.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn module_doc(mut self, doc: impl Into<String>) -> Self {
        self.module_doc = Some(doc.into());
        self
    }

    pub fn argument(mut self, name: impl Into<String>, descriptor: ArgumentDescriptor) -> Self {
        self.arguments = self.arguments.argument(name, descriptor);
        self
    }

    pub fn add(mut self, descriptor: ArgumentDescriptor) -> Self {
        self.arguments = self.arguments.add(descriptor);
        self
    }

    pub fn bundle(mut self, bundle: ArgumentBundle) -> Self {
        self.bundles.push(bundle);
        self
    }

    /// Reuses every argument of `base` (its bundles, then its own
    /// declarations) and its exclusive groups, ahead of anything declared
    /// here.
    pub fn extends(mut self, base: &Self) -> Self {
        let mut bundles = base.bundles.clone();
        let mut own = base.arguments.clone();
        if own.label.is_empty() {
            own.label = base.label();
        }
        bundles.push(own);
        bundles.append(&mut self.bundles);
        self.bundles = bundles;

        let mut exclusive = base.exclusive.clone();
        exclusive.append(&mut self.exclusive);
        self.exclusive = exclusive;
        self
    }

    /// Names of which exactly one must be given.
    pub fn exclusive<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusive.push(names.into_iter().map(Into::into).collect());
        self
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None if self.module.is_empty() => "<anonymous>".to_string(),
            None => self.module.clone(),
        }
    }
}

// --- TREE ---

#[derive(Debug, Clone)]
pub enum NodeKind {
    Leaf(Constructor),
    Dispatcher(Registry),
}

/// A registered command with its merged arguments.
#[derive(Debug, Clone)]
pub struct CommandNode {
    name: CommandName,
    aliases: Vec<String>,
    path: Vec<String>,
    help: String,
    help_short: String,
    module: String,
    lineage: Vec<ArgumentBundle>,
    arguments: Vec<ArgumentSpec>,
    exclusive: Vec<Vec<String>>,
    kind: NodeKind,
}

impl CommandNode {
    /// Builds a node below a parent with the given lineage, exclusive groups
    /// and path. Arguments are merged here, once.
    pub fn build(
        descriptor: CommandDescriptor,
        parent_lineage: &[ArgumentBundle],
        parent_exclusive: &[Vec<String>],
        parent_path: &[String],
    ) -> Result<Self, LoadError> {
        let label = descriptor.label();
        let CommandDescriptor {
            name,
            aliases,
            help,
            help_short,
            doc,
            module,
            module_doc,
            bundles,
            mut arguments,
            exclusive,
            kind,
            ..
        } = descriptor;

        let name = name.ok_or_else(|| RegistrationError::MissingName {
            module: module.clone(),
        })?;
        for key in std::iter::once(name.as_str())
            .filter(|_| !name.is_root())
            .chain(aliases.iter().map(String::as_str))
        {
            if !COMMAND_NAME_RE.is_match(key) {
                return Err(RegistrationError::InvalidName(key.to_string()).into());
            }
        }

        if arguments.label.is_empty() {
            arguments.label = label;
        }
        let mut lineage = parent_lineage.to_vec();
        lineage.extend(bundles);
        lineage.push(arguments);

        let declaration_error = |source: ArgumentDeclarationError| LoadError::Declaration {
            command: name.to_string(),
            source,
        };
        let specs = merge_arguments(&lineage).map_err(declaration_error)?;
        if matches!(kind, CommandKind::Dispatcher) {
            if let Some(spec) = specs.iter().find(|spec| spec.is_positional()) {
                return Err(declaration_error(
                    ArgumentDeclarationError::PositionalOnDispatcher(spec.name.clone()),
                ));
            }
        }
        let mut groups = parent_exclusive.to_vec();
        groups.extend(exclusive);
        validate_exclusive(&specs, &groups).map_err(declaration_error)?;

        let help = help
            .or(doc.clone())
            .or(module_doc.clone())
            .map(|text| normalize_indent(&text))
            .unwrap_or_default();
        let help_short = help_short
            .or_else(|| doc.as_deref().and_then(first_line))
            .or_else(|| module_doc.as_deref().and_then(first_line))
            .or_else(|| first_line(&help))
            .unwrap_or_default();

        let mut path = parent_path.to_vec();
        if let CommandName::Named(own) = &name {
            path.push(own.clone());
        }

        let kind = match kind {
            CommandKind::Leaf(constructor) => NodeKind::Leaf(constructor),
            CommandKind::Dispatcher => NodeKind::Dispatcher(Registry::new(name.as_str())),
            CommandKind::Abstract => {
                return Err(RegistrationError::AbstractCommand(name.to_string()).into());
            }
        };

        Ok(Self {
            name,
            aliases,
            path,
            help,
            help_short,
            module,
            lineage,
            arguments: specs,
            exclusive: groups,
            kind,
        })
    }

    pub fn name(&self) -> &CommandName {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Canonical names from below the root down to this command.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn help_short(&self) -> &str {
        &self.help_short
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// The bundles merged into this command, most general first.
    pub fn lineage(&self) -> &[ArgumentBundle] {
        &self.lineage
    }

    /// The merged, validated arguments.
    pub fn arguments(&self) -> &[ArgumentSpec] {
        &self.arguments
    }

    /// Finds an argument by logical name or by any of its aliases.
    pub fn find_argument(&self, name: &str) -> Option<&ArgumentSpec> {
        self.arguments
            .iter()
            .find(|spec| spec.name == name || spec.aliases.iter().any(|alias| alias == name))
    }

    /// Groups of argument names of which exactly one must be given.
    pub fn exclusive(&self) -> &[Vec<String>] {
        &self.exclusive
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_dispatcher(&self) -> bool {
        matches!(self.kind, NodeKind::Dispatcher(_))
    }

    pub fn constructor(&self) -> Option<Constructor> {
        match self.kind {
            NodeKind::Leaf(constructor) => Some(constructor),
            NodeKind::Dispatcher(_) => None,
        }
    }

    pub fn children(&self) -> Option<&Registry> {
        match &self.kind {
            NodeKind::Dispatcher(registry) => Some(registry),
            NodeKind::Leaf(_) => None,
        }
    }

    fn children_mut(&mut self) -> Option<&mut Registry> {
        match &mut self.kind {
            NodeKind::Dispatcher(registry) => Some(registry),
            NodeKind::Leaf(_) => None,
        }
    }

    /// A direct child by name or alias.
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children().and_then(|registry| registry.get(name))
    }
}

/// The whole command hierarchy, rooted at the ROOT dispatcher. Each
/// dispatcher owns the registry of its children.
#[derive(Debug, Clone)]
pub struct CommandTree {
    root: CommandNode,
}

impl CommandTree {
    pub fn new(root: CommandDescriptor) -> Result<Self, LoadError> {
        if !matches!(root.name, Some(CommandName::Root)) || !matches!(root.kind, CommandKind::Dispatcher) {
            return Err(RegistrationError::InvalidRoot.into());
        }
        Ok(Self {
            root: CommandNode::build(root, &[], &[], &[])?,
        })
    }

    /// Builds a tree and registers every descriptor in it.
    pub fn load(
        root: CommandDescriptor,
        descriptors: impl IntoIterator<Item = CommandDescriptor>,
    ) -> Result<Self, LoadError> {
        let mut tree = Self::new(root)?;
        tree.register_all(descriptors)?;
        Ok(tree)
    }

    /// Registers descriptors, parents before children. Returns how many
    /// commands were added.
    pub fn register_all(
        &mut self,
        descriptors: impl IntoIterator<Item = CommandDescriptor>,
    ) -> Result<usize, LoadError> {
        let mut descriptors: Vec<CommandDescriptor> = descriptors.into_iter().collect();
        descriptors.sort_by_key(|descriptor| descriptor.parent.len());
        let mut added = 0;
        for descriptor in descriptors {
            if self.register(descriptor)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Registers one command under its parent dispatcher. Abstract commands
    /// and commands that are already registered are skipped (`Ok(false)`).
    pub fn register(&mut self, descriptor: CommandDescriptor) -> Result<bool, LoadError> {
        if matches!(descriptor.kind, CommandKind::Abstract) {
            debug!("Skipping abstract command '{}'", descriptor.label());
            return Ok(false);
        }
        match &descriptor.name {
            None => {
                return Err(RegistrationError::MissingName {
                    module: descriptor.module.clone(),
                }
                .into());
            }
            Some(CommandName::Root) => {
                return Err(RegistrationError::DuplicateRoot {
                    module: descriptor.module.clone(),
                }
                .into());
            }
            Some(CommandName::Named(_)) => {}
        }

        let command = descriptor.label();
        let parent = self.dispatcher_mut(&descriptor.parent, &command)?;
        let node = CommandNode::build(descriptor, &parent.lineage, &parent.exclusive, &parent.path)?;
        let registry = parent
            .children_mut()
            .ok_or_else(|| RegistrationError::InvalidRoot)?;
        Ok(registry.register(node)? == Registered::Inserted)
    }

    fn dispatcher_mut(
        &mut self,
        path: &[String],
        command: &str,
    ) -> Result<&mut CommandNode, RegistrationError> {
        let mut current = &mut self.root;
        for segment in path {
            let parent_name = current.name.to_string();
            let registry = current
                .children_mut()
                .ok_or_else(|| RegistrationError::NotADispatcher {
                    command: command.to_string(),
                    parent: parent_name.clone(),
                })?;
            current = registry
                .get_mut(segment)
                .ok_or_else(|| RegistrationError::MissingParent {
                    command: command.to_string(),
                    parent: path.join(" "),
                })?;
        }
        if !current.is_dispatcher() {
            return Err(RegistrationError::NotADispatcher {
                command: command.to_string(),
                parent: current.name.to_string(),
            });
        }
        Ok(current)
    }

    pub fn root(&self) -> &CommandNode {
        &self.root
    }

    /// Resolves a path of names or aliases below the root. The empty path
    /// is the root itself.
    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Option<&CommandNode> {
        path.iter()
            .try_fold(&self.root, |node, segment| node.child(segment.as_ref()))
    }
}
