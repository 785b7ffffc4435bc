//! Declarative command-tree assembly.
//!
//! # Design
//! - Each command module contributes a [`CommandDescriptor`] tagged with the
//!   path of its parent ([`Affinity`]); no module wires its own children.
//! - [`CommandTreeBuilder::build`] places descriptors into an arena
//!   (`Vec<Node>` with parent indices), shallowest paths first, so the result
//!   does not depend on registration order.
//! - Siblings are ordered by name. Inline commands stay in declaration order
//!   and render before descriptor children.
//! - The finished tree renders itself into a `clap::Command` and maps parsed
//!   matches back to the selected node.

use std::collections::{HashMap, HashSet};
use std::fmt;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::cancel::Cancellation;
use crate::context::ExecutionContext;
use crate::error::{CliError, CliResult};

/// Global flag toggling verbose output.
pub const VERBOSE_ARG: &str = "verbose";
/// Global option overriding the HTTP timeout.
pub const TIMEOUT_ARG: &str = "timeout";
/// Environment variable backing [`TIMEOUT_ARG`].
pub const TIMEOUT_ENV: &str = "FLAGDECK_HTTP_TIMEOUT_SECS";
/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TIMEOUT: &str = "30";

/// Future returned by command handlers.
pub type HandlerFuture<'a> = BoxFuture<'a, CliResult<()>>;

/// Command handler: a plain function pointer stored inside the descriptor.
pub type Handler =
    for<'a> fn(&'a ArgMatches, &'a ExecutionContext, &'a Cancellation) -> HandlerFuture<'a>;

/// Where a descriptor is placed in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// The single root command.
    Root,
    /// Child of the command at this path below the root (empty = top level).
    ChildOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Flag,
    Single,
    Many,
}

/// Named option (`--name value`).
#[derive(Debug, Clone)]
pub struct OptionSpec {
    name: &'static str,
    about: &'static str,
    short: Option<char>,
    aliases: Vec<&'static str>,
    required: bool,
    kind: ValueKind,
}

impl OptionSpec {
    /// Option taking one value.
    #[must_use]
    pub const fn value(name: &'static str, about: &'static str) -> Self {
        Self {
            name,
            about,
            short: None,
            aliases: Vec::new(),
            required: false,
            kind: ValueKind::Single,
        }
    }

    /// Option taking one or more values.
    #[must_use]
    pub fn many(name: &'static str, about: &'static str) -> Self {
        Self {
            kind: ValueKind::Many,
            ..Self::value(name, about)
        }
    }

    /// Boolean switch.
    #[must_use]
    pub fn flag(name: &'static str, about: &'static str) -> Self {
        Self {
            kind: ValueKind::Flag,
            ..Self::value(name, about)
        }
    }

    /// Single-letter short form.
    #[must_use]
    pub const fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Additional long name.
    #[must_use]
    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    /// Mark the option as mandatory.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.name)
            .long(self.name)
            .help(self.about)
            .visible_aliases(self.aliases.clone());
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        match self.kind {
            ValueKind::Flag => arg.action(ArgAction::SetTrue),
            ValueKind::Single => arg.action(ArgAction::Set).required(self.required),
            ValueKind::Many => arg
                .action(ArgAction::Append)
                .num_args(1..)
                .required(self.required),
        }
    }
}

/// Positional argument.
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    name: &'static str,
    about: &'static str,
    required: bool,
    many: bool,
}

impl ArgumentSpec {
    /// Required single positional argument.
    #[must_use]
    pub const fn new(name: &'static str, about: &'static str) -> Self {
        Self {
            name,
            about,
            required: true,
            many: false,
        }
    }

    /// Accept any number of values.
    #[must_use]
    pub const fn many(mut self) -> Self {
        self.many = true;
        self
    }

    /// Allow the argument to be omitted.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn to_arg(&self) -> Arg {
        let arg = Arg::new(self.name)
            .help(self.about)
            .required(self.required);
        if self.many {
            arg.action(ArgAction::Append).num_args(1..)
        } else {
            arg.action(ArgAction::Set)
        }
    }
}

/// Leaf command declared directly inside its owner descriptor.
#[derive(Clone)]
pub struct InlineCommand {
    name: &'static str,
    about: &'static str,
    aliases: Vec<&'static str>,
    options: Vec<OptionSpec>,
    arguments: Vec<ArgumentSpec>,
    handler: Handler,
}

impl InlineCommand {
    /// Inline command with a handler.
    #[must_use]
    pub const fn new(name: &'static str, about: &'static str, handler: Handler) -> Self {
        Self {
            name,
            about,
            aliases: Vec::new(),
            options: Vec::new(),
            arguments: Vec::new(),
            handler,
        }
    }

    /// Additional name.
    #[must_use]
    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    /// Add an option.
    #[must_use]
    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    /// Add a positional argument.
    #[must_use]
    pub fn argument(mut self, argument: ArgumentSpec) -> Self {
        self.arguments.push(argument);
        self
    }

    fn to_clap(&self) -> Command {
        render_command(
            self.name,
            self.about,
            &self.aliases,
            &self.options,
            &self.arguments,
        )
    }
}

impl fmt::Debug for InlineCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("InlineCommand")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

/// Declarative description of one command node.
#[derive(Clone)]
pub struct CommandDescriptor {
    name: &'static str,
    about: &'static str,
    aliases: Vec<&'static str>,
    options: Vec<OptionSpec>,
    arguments: Vec<ArgumentSpec>,
    inline: Vec<InlineCommand>,
    handler: Option<Handler>,
    affinity: Affinity,
    requires_auth: bool,
}

impl CommandDescriptor {
    /// Descriptor placed according to `affinity`.
    #[must_use]
    pub const fn new(name: &'static str, about: &'static str, affinity: Affinity) -> Self {
        Self {
            name,
            about,
            aliases: Vec::new(),
            options: Vec::new(),
            arguments: Vec::new(),
            inline: Vec::new(),
            handler: None,
            affinity,
            requires_auth: true,
        }
    }

    /// The root descriptor.
    #[must_use]
    pub const fn root(name: &'static str, about: &'static str) -> Self {
        Self::new(name, about, Affinity::Root).without_auth()
    }

    /// Additional name.
    #[must_use]
    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    /// Add an option.
    #[must_use]
    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    /// Add a positional argument.
    #[must_use]
    pub fn argument(mut self, argument: ArgumentSpec) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Add an inline leaf command.
    #[must_use]
    pub fn inline(mut self, command: InlineCommand) -> Self {
        self.inline.push(command);
        self
    }

    /// Attach the handler run when this node is selected.
    #[must_use]
    pub const fn handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Allow the command (and its inline children) to run without a credential.
    #[must_use]
    pub const fn without_auth(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    /// Command name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Declared placement.
    #[must_use]
    pub const fn affinity(&self) -> Affinity {
        self.affinity
    }

    fn validate(&self, path: &str) -> Result<(), TreeError> {
        check_parameters(path, self.about, &self.options, &self.arguments)?;
        for inline in &self.inline {
            let inline_path = format!("{path} {}", inline.name);
            check_parameters(&inline_path, inline.about, &inline.options, &inline.arguments)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("affinity", &self.affinity)
            .field("inline", &self.inline)
            .field("has_handler", &self.handler.is_some())
            .field("requires_auth", &self.requires_auth)
            .finish_non_exhaustive()
    }
}

/// Failures detected while assembling the tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// No descriptor declared itself as the root.
    #[error("no root command registered")]
    MissingRoot,
    /// More than one descriptor declared itself as the root.
    #[error("multiple root commands registered: '{first}' and '{second}'")]
    MultipleRoots {
        /// First root seen.
        first: &'static str,
        /// Conflicting root.
        second: &'static str,
    },
    /// A descriptor names a parent path that does not exist.
    #[error("command '{command}' declares unknown parent '{parent}'")]
    UnknownParent {
        /// Offending command.
        command: &'static str,
        /// Declared parent path.
        parent: String,
    },
    /// Two siblings share a name or alias.
    #[error("duplicate command name '{name}' under '{parent}'")]
    DuplicateSibling {
        /// Parent path.
        parent: String,
        /// Conflicting name or alias.
        name: &'static str,
    },
    /// Two options/arguments of one command share a name.
    #[error("duplicate parameter '{parameter}' on '{command}'")]
    DuplicateParameter {
        /// Command path.
        command: String,
        /// Conflicting parameter name.
        parameter: &'static str,
    },
    /// A command or parameter has an empty description.
    #[error("'{command}' has no description")]
    MissingDescription {
        /// Command (or `command --parameter`) path.
        command: String,
    },
}

/// Collects descriptors in any order.
#[derive(Debug, Default)]
pub struct CommandTreeBuilder {
    descriptors: Vec<CommandDescriptor>,
}

impl CommandTreeBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one descriptor.
    pub fn register(&mut self, descriptor: CommandDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Register many descriptors.
    pub fn register_all(
        &mut self,
        descriptors: impl IntoIterator<Item = CommandDescriptor>,
    ) -> &mut Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Assemble and validate the tree.
    ///
    /// # Errors
    ///
    /// Returns the first [`TreeError`] found; any error is fatal at startup.
    pub fn build(self) -> Result<CommandTree, TreeError> {
        let mut root = None;
        let mut rest = Vec::with_capacity(self.descriptors.len());
        for descriptor in self.descriptors {
            if descriptor.affinity != Affinity::Root {
                rest.push(descriptor);
                continue;
            }
            if let Some(existing) = &root {
                let existing: &CommandDescriptor = existing;
                return Err(TreeError::MultipleRoots {
                    first: existing.name,
                    second: descriptor.name,
                });
            }
            root = Some(descriptor);
        }
        let root = root.ok_or(TreeError::MissingRoot)?;

        rest.sort_by(|left, right| {
            parent_path(left)
                .len()
                .cmp(&parent_path(right).len())
                .then_with(|| parent_path(left).cmp(parent_path(right)))
                .then_with(|| left.name.cmp(right.name))
        });

        root.validate(root.name)?;
        let mut nodes = vec![Node {
            descriptor: root,
            parent: None,
            children: Vec::new(),
            path: Vec::new(),
        }];
        let mut by_path: HashMap<Vec<&'static str>, NodeId> = HashMap::new();
        by_path.insert(Vec::new(), NodeId(0));

        for descriptor in rest {
            let parent_segments = parent_path(&descriptor);
            let Some(&parent) = by_path.get(parent_segments) else {
                return Err(TreeError::UnknownParent {
                    command: descriptor.name,
                    parent: parent_segments.join(" "),
                });
            };

            let mut path = parent_segments.to_vec();
            path.push(descriptor.name);
            descriptor.validate(&path.join(" "))?;

            let id = NodeId(nodes.len());
            if by_path.insert(path.clone(), id).is_some() {
                return Err(TreeError::DuplicateSibling {
                    parent: parent_segments.join(" "),
                    name: descriptor.name,
                });
            }
            nodes[parent.0].children.push(id);
            nodes.push(Node {
                descriptor,
                parent: Some(parent),
                children: Vec::new(),
                path,
            });
        }

        let tree = CommandTree {
            nodes,
            root: NodeId(0),
        };
        for index in 0..tree.nodes.len() {
            tree.check_siblings(NodeId(index))?;
        }
        Ok(tree)
    }
}

fn parent_path(descriptor: &CommandDescriptor) -> &'static [&'static str] {
    match descriptor.affinity {
        Affinity::Root => &[],
        Affinity::ChildOf(path) => path,
    }
}

fn check_parameters(
    path: &str,
    about: &str,
    options: &[OptionSpec],
    arguments: &[ArgumentSpec],
) -> Result<(), TreeError> {
    if about.trim().is_empty() {
        return Err(TreeError::MissingDescription {
            command: path.to_string(),
        });
    }

    let mut seen = HashSet::new();
    let parameters = options
        .iter()
        .map(|option| (option.name, option.about))
        .chain(options.iter().flat_map(|option| {
            option.aliases.iter().map(move |alias| (*alias, option.about))
        }))
        .chain(arguments.iter().map(|argument| (argument.name, argument.about)));
    for (name, about) in parameters {
        if about.trim().is_empty() {
            return Err(TreeError::MissingDescription {
                command: format!("{path} --{name}"),
            });
        }
        if !seen.insert(name) {
            return Err(TreeError::DuplicateParameter {
                command: path.to_string(),
                parameter: name,
            });
        }
    }
    Ok(())
}

fn render_command(
    name: &'static str,
    about: &'static str,
    aliases: &[&'static str],
    options: &[OptionSpec],
    arguments: &[ArgumentSpec],
) -> Command {
    Command::new(name)
        .about(about)
        .visible_aliases(aliases.to_vec())
        .args(options.iter().map(OptionSpec::to_arg))
        .args(arguments.iter().map(ArgumentSpec::to_arg))
}

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    descriptor: CommandDescriptor,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    path: Vec<&'static str>,
}

/// Node chosen by the parsed command line.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'m> {
    node: NodeId,
    inline: Option<usize>,
    matches: &'m ArgMatches,
}

impl<'m> Selection<'m> {
    /// Matches of the selected command.
    #[must_use]
    pub const fn matches(&self) -> &'m ArgMatches {
        self.matches
    }
}

/// Assembled, validated command tree.
#[derive(Debug)]
pub struct CommandTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl CommandTree {
    /// Number of descriptor nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes; never true for a built tree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Space-separated command paths in pre-order, starting with the root.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            paths.push(self.display_path(id));
            stack.extend(self.children_sorted(id).into_iter().rev());
        }
        paths
    }

    /// Render the tree into a `clap` command.
    #[must_use]
    pub fn to_clap(&self) -> Command {
        self.render_node(self.root)
            .version(env!("CARGO_PKG_VERSION"))
            .arg(
                Arg::new(VERBOSE_ARG)
                    .long(VERBOSE_ARG)
                    .short('v')
                    .help("Print detailed diagnostics")
                    .action(ArgAction::SetTrue)
                    .global(true),
            )
            .arg(
                Arg::new(TIMEOUT_ARG)
                    .long(TIMEOUT_ARG)
                    .help("HTTP timeout in seconds")
                    .env(TIMEOUT_ENV)
                    .default_value(DEFAULT_TIMEOUT)
                    .value_parser(value_parser!(u64))
                    .global(true),
            )
    }

    /// Map parsed matches to the selected node.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failure`] when the matches were not produced by
    /// this tree's `clap` command.
    pub fn resolve<'m>(&self, matches: &'m ArgMatches) -> CliResult<Selection<'m>> {
        let mut node = self.root;
        let mut current = matches;
        while let Some((name, sub_matches)) = current.subcommand() {
            let descriptor = &self.nodes[node.0].descriptor;
            if let Some(index) = descriptor
                .inline
                .iter()
                .position(|inline| inline.name == name)
            {
                return Ok(Selection {
                    node,
                    inline: Some(index),
                    matches: sub_matches,
                });
            }
            node = self.nodes[node.0]
                .children
                .iter()
                .copied()
                .find(|child| self.nodes[child.0].descriptor.name == name)
                .ok_or_else(|| {
                    CliError::failure(anyhow::anyhow!(
                        "subcommand '{name}' is not part of the command tree"
                    ))
                })?;
            current = sub_matches;
        }
        Ok(Selection {
            node,
            inline: None,
            matches: current,
        })
    }

    /// Handler of the selected command, if it has one.
    #[must_use]
    pub fn handler(&self, selection: &Selection<'_>) -> Option<Handler> {
        let descriptor = &self.nodes[selection.node.0].descriptor;
        match selection.inline {
            Some(index) => descriptor.inline.get(index).map(|inline| inline.handler),
            None => descriptor.handler,
        }
    }

    /// Whether the selected command needs a credential before dispatch.
    #[must_use]
    pub fn requires_auth(&self, selection: &Selection<'_>) -> bool {
        self.nodes[selection.node.0].descriptor.requires_auth
    }

    /// Space-separated names leading to the selected command, root included.
    #[must_use]
    pub fn selection_path(&self, selection: &Selection<'_>) -> String {
        let mut path = self.display_path(selection.node);
        if let Some(inline) = selection
            .inline
            .and_then(|index| self.nodes[selection.node.0].descriptor.inline.get(index))
        {
            path.push(' ');
            path.push_str(inline.name);
        }
        path
    }

    /// Error raised when the selected node cannot be run.
    #[must_use]
    pub fn not_runnable(&self, selection: &Selection<'_>) -> CliError {
        let node = &self.nodes[selection.node.0];
        let path = self.selection_path(selection);
        let message = if selection.inline.is_none()
            && (!node.children.is_empty() || !node.descriptor.inline.is_empty())
        {
            format!("'{path}' requires a subcommand.")
        } else {
            format!("'{path}' has no handler configured.")
        };
        CliError::Configuration {
            message,
            help: self.help_for(selection),
        }
    }

    /// Rendered help text of the selected command.
    #[must_use]
    pub fn help_for(&self, selection: &Selection<'_>) -> String {
        let mut command = self.to_clap();
        command.build();

        let inline = selection
            .inline
            .and_then(|index| self.nodes[selection.node.0].descriptor.inline.get(index))
            .map(|inline| inline.name);
        let segments = self.nodes[selection.node.0]
            .path
            .iter()
            .copied()
            .chain(inline);
        for name in segments {
            match command.find_subcommand(name).cloned() {
                Some(next) => command = next,
                None => break,
            }
        }
        command.render_help().to_string()
    }

    fn render_node(&self, id: NodeId) -> Command {
        let descriptor = &self.nodes[id.0].descriptor;
        let command = render_command(
            descriptor.name,
            descriptor.about,
            &descriptor.aliases,
            &descriptor.options,
            &descriptor.arguments,
        );
        let command = descriptor
            .inline
            .iter()
            .fold(command, |command, inline| command.subcommand(inline.to_clap()));
        self.children_sorted(id)
            .into_iter()
            .fold(command, |command, child| {
                command.subcommand(self.render_node(child))
            })
    }

    fn children_sorted(&self, id: NodeId) -> Vec<NodeId> {
        let mut children = self.nodes[id.0].children.clone();
        children.sort_by_key(|child| self.nodes[child.0].descriptor.name);
        children
    }

    fn display_path(&self, id: NodeId) -> String {
        let root = self.nodes[self.root.0].descriptor.name;
        std::iter::once(root)
            .chain(self.nodes[id.0].path.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn check_siblings(&self, id: NodeId) -> Result<(), TreeError> {
        let node = &self.nodes[id.0];
        let inline_names = node
            .descriptor
            .inline
            .iter()
            .flat_map(|inline| std::iter::once(inline.name).chain(inline.aliases.iter().copied()));
        let child_names = node.children.iter().flat_map(|child| {
            let descriptor = &self.nodes[child.0].descriptor;
            std::iter::once(descriptor.name).chain(descriptor.aliases.iter().copied())
        });

        let mut seen = HashSet::new();
        for name in inline_names.chain(child_names) {
            if !seen.insert(name) {
                return Err(TreeError::DuplicateSibling {
                    parent: self.display_path(id),
                    name,
                });
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn parent_of(&self, path: &[&str]) -> Option<Vec<&'static str>> {
        let node = self.nodes.iter().find(|node| node.path == path)?;
        node.parent.map(|parent| self.nodes[parent.0].path.clone())
    }
}
