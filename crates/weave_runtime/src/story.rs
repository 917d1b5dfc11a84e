//! The embedding surface.
//!
//! A [`Story`] owns one loaded content graph and the mutable state that
//! walks it. Hosts drive it with `continue_` and `choose_choice`, and hook
//! into it through variable observers, external functions and the
//! error/warning hooks.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, error, info, warn};
use weave_ir::{
    ContainerId, ControlCommand, DivertTarget, INK_VERSION_CURRENT, Node, Path, PushPopType,
    StoryGraph, Target,
};

use crate::config::StoryConfig;
use crate::core::{Choice, Pointer, StoryState, Value};
use crate::errors::{Severity, StoryError, StoryResult, messages};
use crate::externals::ExternalRegistry;
use crate::observers::{ObserverHandle, ObserverRegistry};
use crate::snapshot;
use crate::util::{Capabilities, RngAlgorithm};
use crate::vm::Lookahead;

const GLOBAL_DECL: &str = "global decl";

pub type HookFn = Box<dyn FnMut(&str, Severity)>;

pub struct Story {
    pub(crate) graph: Rc<StoryGraph>,
    pub(crate) state: StoryState,
    pub(crate) config: StoryConfig,
    pub(crate) caps: Capabilities,
    pub(crate) externals: ExternalRegistry,
    pub(crate) observers: ObserverRegistry,
    pub(crate) lookahead: Lookahead,
    /// Host callbacks currently running on the stack.
    pub(crate) callback_depth: u32,
    pub(crate) observers_muted: bool,
    pub(crate) continue_depth: u32,
    /// Observer deliveries held until the end of `continue_`, as (old, new).
    pub(crate) batched: IndexMap<String, (Option<Value>, Value)>,
    error_hook: Option<HookFn>,
    warning_hook: Option<HookFn>,
    reported_warnings: usize,
    initial_seed: i64,
    externals_validated: bool,
    state_version: u64,
}

impl Story {
    /// Loads compiled story JSON with the default configuration.
    pub fn new(json: &str) -> StoryResult<Self> {
        Self::with_config(json, StoryConfig::default())
    }

    pub fn with_config(json: &str, config: StoryConfig) -> StoryResult<Self> {
        let graph = weave_ir::load_story(json)?;
        Self::from_graph(graph, config)
    }

    /// Builds a story around an already loaded graph and runs its global
    /// declarations.
    pub fn from_graph(graph: StoryGraph, config: StoryConfig) -> StoryResult<Self> {
        let version = graph.version;
        let containers = graph.containers.len();
        let mut story = Self {
            graph: Rc::new(graph),
            state: StoryState::new(0),
            config,
            caps: Capabilities::default(),
            externals: ExternalRegistry::new(),
            observers: ObserverRegistry::new(),
            lookahead: Lookahead::default(),
            callback_depth: 0,
            observers_muted: false,
            continue_depth: 0,
            batched: IndexMap::new(),
            error_hook: None,
            warning_hook: None,
            reported_warnings: 0,
            initial_seed: 0,
            externals_validated: false,
            state_version: 0,
        };
        if version != INK_VERSION_CURRENT {
            story.state.add_warning(format!(
                "Version of ink used to build story ({version}) doesn't match current version of engine ({INK_VERSION_CURRENT}). Non-critical, but recommend synchronising."
            ));
        }
        story.reset_globals()?;
        info!(version, containers, "story loaded");
        Ok(story)
    }

    pub fn graph(&self) -> &StoryGraph {
        &self.graph
    }

    pub fn state(&self) -> &StoryState {
        &self.state
    }

    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: StoryConfig) {
        self.config = config;
    }

    /// Incremented whenever the state is replaced wholesale.
    pub fn state_version(&self) -> u64 {
        self.state_version
    }

    fn guard_reentry(&self, operation: &str) -> StoryResult<()> {
        if self.callback_depth > 0 {
            return Err(StoryError::Reentrancy(format!(
                "{}: {operation}",
                messages::CALLBACK_REENTRY
            )));
        }
        Ok(())
    }

    // ---- Running ----

    pub fn can_continue(&self) -> bool {
        self.state.can_continue()
    }

    /// Runs until the next complete line of output, a set of choices or
    /// the end of the story, and returns the line.
    ///
    /// On error the state is rolled back to where the call started. Errors
    /// that are not recoverable also stop the story until
    /// [`Story::reset_errors`] is called.
    pub fn continue_(&mut self) -> StoryResult<String> {
        self.guard_reentry("continue_")?;
        if !self.state.can_continue() {
            return Err(StoryError::control(messages::CANNOT_CONTINUE));
        }
        if !self.externals_validated {
            if let Err(err) = self.validate_external_bindings() {
                self.report_error(&err);
                return Err(err);
            }
            self.externals_validated = true;
        }

        let rollback = self.state.clone();
        self.continue_depth += 1;
        let result = self.continue_internal();
        self.continue_depth -= 1;

        match result {
            Ok(text) => {
                self.flush_batched_changes();
                self.report_warnings();
                Ok(text)
            }
            Err(err) => {
                self.state = rollback;
                self.lookahead = Lookahead::default();
                self.batched.clear();
                if !err.is_recoverable() {
                    self.state.add_error(err.to_string());
                }
                self.report_error(&err);
                self.report_warnings();
                Err(err)
            }
        }
    }

    /// Continues until choices are offered or the story ends.
    pub fn continue_maximally(&mut self) -> StoryResult<String> {
        let mut text = String::new();
        while self.can_continue() {
            text.push_str(&self.continue_()?);
        }
        Ok(text)
    }

    /// Executes a single node. Text it produces is discarded by the next
    /// `continue_`, which starts a fresh line.
    pub fn step(&mut self) -> StoryResult<()> {
        self.guard_reentry("step")?;
        if !self.state.can_continue() {
            return Err(StoryError::control(messages::CANNOT_CONTINUE));
        }
        let result = self.step_internal().and_then(|()| {
            if !self.state.can_continue() && !self.state.call_stack.element_is_evaluate_from_game()
            {
                self.try_follow_default_invisible_choice()?;
            }
            Ok(())
        });
        if let Err(err) = &result {
            self.report_error(err);
        }
        result
    }

    // ---- Output ----

    /// Text of the last line produced.
    pub fn current_text(&self) -> String {
        self.state.output.current_text()
    }

    pub fn current_tags(&self) -> Vec<String> {
        self.state.output.current_tags()
    }

    /// Tags at the very top of the story.
    pub fn global_tags(&self) -> StoryResult<Vec<String>> {
        self.tags_at_start_of(StoryGraph::ROOT)
    }

    /// Tags at the start of a knot or stitch.
    pub fn tags_for_content_at_path(&self, path: &str) -> StoryResult<Vec<String>> {
        let path = Path::parse(path);
        match self.graph.resolve(&path) {
            Some(Target::Container(id)) => self.tags_at_start_of(id),
            _ => Err(StoryError::unresolved(&path)),
        }
    }

    fn tags_at_start_of(&self, mut id: ContainerId) -> StoryResult<Vec<String>> {
        while let Some(Node::Container(first)) = self.graph.container(id).content.first() {
            id = *first;
        }
        let mut tags = Vec::new();
        let mut in_tag = false;
        for node in &self.graph.container(id).content {
            match node {
                Node::Control(ControlCommand::BeginTag) => in_tag = true,
                Node::Control(ControlCommand::EndTag) => in_tag = false,
                Node::Text(text) if in_tag => tags.push(text.trim().to_string()),
                Node::Tag(text) => tags.push(text.clone()),
                _ if in_tag => {
                    return Err(StoryError::eval(
                        "Tag contained non-text content. Only plain text is allowed when using global_tags or tags_for_content_at_path.",
                    ));
                }
                _ => break,
            }
        }
        Ok(tags)
    }

    // ---- Choices ----

    /// Choices on offer, with invisible defaults filtered out.
    pub fn current_choices(&self) -> Vec<Choice> {
        self.state
            .current_choices
            .iter()
            .filter(|c| !c.is_invisible_default)
            .enumerate()
            .map(|(index, c)| Choice {
                index,
                ..c.clone()
            })
            .collect()
    }

    /// Takes the choice at `index` in [`Story::current_choices`].
    pub fn choose_choice(&mut self, index: usize) -> StoryResult<()> {
        self.guard_reentry("choose_choice")?;
        let result = self.choose_visible(index);
        if let Err(err) = &result {
            self.report_error(err);
        }
        result
    }

    pub fn choose(&mut self, choice: &Choice) -> StoryResult<()> {
        self.choose_choice(choice.index)
    }

    fn choose_visible(&mut self, index: usize) -> StoryResult<()> {
        let mut visible = self
            .state
            .current_choices
            .iter()
            .filter(|c| !c.is_invisible_default);
        let available = visible.clone().count();
        let Some(choice) = visible.nth(index).cloned() else {
            return Err(StoryError::ChoiceOutOfRange { index, available });
        };
        let pointer = self.pointer_at_path(&choice.target_path)?;
        debug!(index, text = %choice.text, target = %choice.target_path, "choice taken");
        self.state
            .call_stack
            .set_current_thread(choice.thread_at_generation);
        self.choose_pointer(pointer, true);
        Ok(())
    }

    /// Jumps to a knot, stitch or `knot.stitch.N` position, pushing `args`
    /// for the target to read.
    pub fn choose_path_string(
        &mut self,
        path: &str,
        reset_callstack: bool,
        args: &[Value],
    ) -> StoryResult<()> {
        self.guard_reentry("choose_path_string")?;
        let path = Path::parse(path);
        let pointer = self.pointer_at_path(&path)?;
        if reset_callstack {
            self.state.force_end();
        } else if self.state.call_stack.current_frame().kind == PushPopType::Function {
            return Err(StoryError::control(format!(
                "Story was running a function ({}) when you called choose_path_string({path}) - this is almost certainly not what you want!",
                self.current_path().unwrap_or_default()
            )));
        }
        for arg in args {
            self.state.eval_stack.push(arg.clone());
        }
        self.choose_pointer(pointer, true);
        Ok(())
    }

    /// Rendered path of the next node to run, if any.
    pub fn current_path(&self) -> Option<String> {
        self.state
            .current_pointer()
            .map(|p| p.path(&self.graph).to_string())
    }

    pub fn visit_count_at_path(&self, path: &str) -> StoryResult<i64> {
        let path = Path::parse(path);
        match self.graph.resolve(&path) {
            Some(Target::Container(id)) => Ok(self.state.visit_counts.get(&id).copied().unwrap_or(0)),
            _ => Err(StoryError::unresolved(&path)),
        }
    }

    // ---- Variables ----

    pub fn variable(&self, name: &str) -> Option<Value> {
        self.state.variables.global(name).cloned()
    }

    /// Assigns a declared global, notifying observers when the value changes.
    pub fn set_variable(&mut self, name: &str, value: impl Into<Value>) -> StoryResult<()> {
        if !self.state.variables.global_exists(name) {
            return Err(StoryError::eval(format!(
                "Cannot assign to a variable ({name}) that hasn't been declared in the story"
            )));
        }
        if let Some(change) = self.state.variables.set_global(name, value.into()) {
            self.notify_variable_change(change);
        }
        Ok(())
    }

    /// Registers `observer` for changes to the global `name`. Observers run
    /// in registration order, receiving the name, old value and new value.
    pub fn observe_variable<F>(&mut self, name: &str, observer: F) -> ObserverHandle
    where
        F: FnMut(&mut Story, &str, Option<&Value>, &Value) + 'static,
    {
        self.observers.add(name, Box::new(observer))
    }

    /// Registers one copy of `observer` per name, in the order given.
    pub fn observe_variables<F>(&mut self, names: &[&str], observer: F) -> Vec<ObserverHandle>
    where
        F: FnMut(&mut Story, &str, Option<&Value>, &Value) + Clone + 'static,
    {
        names
            .iter()
            .map(|name| self.observe_variable(name, observer.clone()))
            .collect()
    }

    pub fn remove_observer(&mut self, handle: &ObserverHandle) -> bool {
        self.observers.remove(handle)
    }

    // ---- External functions ----

    /// Binds a host function to an `EXTERNAL` declaration.
    ///
    /// A lookahead-unsafe function is never run speculatively: reaching it
    /// ends the newline lookahead, and calling it from a forked thread fails
    /// that thread.
    pub fn bind_external_function<F>(
        &mut self,
        name: &str,
        fun: F,
        lookahead_safe: bool,
    ) -> StoryResult<()>
    where
        F: FnMut(&mut Story, &[Value]) -> Result<Value, String> + 'static,
    {
        if self.externals.contains(name) {
            return Err(StoryError::ExternalFunction {
                name: name.to_string(),
                message: "function has already been bound".into(),
            });
        }
        self.externals.register(name, Box::new(fun), lookahead_safe);
        Ok(())
    }

    pub fn unbind_external_function(&mut self, name: &str) -> bool {
        self.externals.unregister(name)
    }

    /// Checks that every external the story calls is bound or has an ink
    /// fallback.
    pub fn validate_external_bindings(&self) -> StoryResult<()> {
        let mut missing: Vec<&str> = Vec::new();
        for container in &self.graph.containers {
            for node in &container.content {
                let Node::Divert(divert) = node else { continue };
                let DivertTarget::External { name, .. } = &divert.target else {
                    continue;
                };
                if self.externals.contains(name) || missing.contains(&name.as_str()) {
                    continue;
                }
                let fallback = self.config.allow_external_function_fallbacks
                    && self.graph.named_root_container(name).is_some();
                if !fallback {
                    missing.push(name);
                }
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        Err(StoryError::ExternalFunction {
            name: missing.join(", "),
            message: if self.config.allow_external_function_fallbacks {
                "missing binding, and no fallback ink function found".into()
            } else {
                "missing binding (ink fallbacks disabled)".into()
            },
        })
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.graph.named_root_container(name).is_some()
    }

    /// Calls an ink function and returns its result with the text it printed.
    ///
    /// A lookahead-safe evaluation runs on a copy of the state and leaves no
    /// trace. Otherwise it runs on the real state and its side effects stay;
    /// that is refused while the story is previewing content.
    pub fn evaluation_function(
        &mut self,
        name: &str,
        args: &[Value],
        lookahead_safe: bool,
    ) -> StoryResult<(Value, String)> {
        if !lookahead_safe {
            if self.lookahead.active() || self.state.call_stack.is_forked() {
                return Err(StoryError::eval(messages::LOOKAHEAD_UNSAFE_IN_PREVIEW));
            }
            self.guard_reentry("evaluation_function")?;
        }
        let Some(container) = self.graph.named_root_container(name) else {
            return Err(StoryError::Resolution(format!(
                "Function doesn't exist: '{name}'"
            )));
        };

        let saved = self.state.clone();
        let was_muted = self.observers_muted;
        self.observers_muted = was_muted || lookahead_safe;
        let result = self.run_function_evaluation(container, args);
        self.observers_muted = was_muted;

        if lookahead_safe || result.is_err() {
            self.state = saved;
        }
        if let Err(err) = &result {
            self.report_error(err);
        }
        result
    }

    // ---- Persistence ----

    /// Serializes the complete story state.
    pub fn to_json(&self) -> StoryResult<String> {
        let value = self.to_json_value()?;
        serde_json::to_string(&value).map_err(|e| StoryError::Snapshot(e.to_string()))
    }

    pub fn to_json_value(&self) -> StoryResult<serde_json::Value> {
        snapshot::save(&self.graph, &self.state)
    }

    /// Replaces the story state with a saved one. Nothing changes unless
    /// the whole save loads.
    pub fn load_json(&mut self, json: &str) -> StoryResult<()> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| StoryError::Snapshot(e.to_string()))?;
        self.load_json_value(&value)
    }

    pub fn load_json_value(&mut self, value: &serde_json::Value) -> StoryResult<()> {
        self.guard_reentry("load_json")?;
        let state = snapshot::load(&self.graph, &self.state, value)?;
        self.replace_state(state);
        Ok(())
    }

    /// Swaps in new compiled content, carrying the current state across.
    /// Every saved path must exist in the new content.
    pub fn reload(&mut self, json: &str) -> StoryResult<()> {
        self.guard_reentry("reload")?;
        let saved = snapshot::save(&self.graph, &self.state)?;
        let fresh = Story::with_config(json, self.config)?;
        let state = snapshot::load(&fresh.graph, &fresh.state, &saved)?;
        self.graph = fresh.graph;
        self.externals_validated = false;
        self.replace_state(state);
        info!(version = self.state_version, "story content reloaded");
        Ok(())
    }

    fn replace_state(&mut self, state: StoryState) {
        self.state = state;
        self.lookahead = Lookahead::default();
        self.batched.clear();
        self.reported_warnings = 0;
        self.state_version += 1;
    }

    // ---- Reset ----

    /// Starts the story over from the top, with fresh globals.
    pub fn reset_state(&mut self) -> StoryResult<()> {
        self.guard_reentry("reset_state")?;
        self.replace_state(StoryState::new(self.initial_seed));
        self.reset_globals()
    }

    /// Reruns the global declarations and takes their values as the new
    /// defaults.
    pub fn reset_globals(&mut self) -> StoryResult<()> {
        self.guard_reentry("reset_globals")?;
        if let Some(decl) = self.graph.named_root_container(GLOBAL_DECL) {
            let call_stack = self.state.call_stack.clone();
            let choices = std::mem::take(&mut self.state.current_choices);
            let output = std::mem::take(&mut self.state.output);

            self.choose_pointer(Pointer::start_of(decl), false);
            let result = self.continue_internal();

            self.state.call_stack = call_stack;
            self.state.current_choices = choices;
            self.state.output = output;
            self.state.did_safe_exit = false;
            result?;
        }
        self.state.variables.snapshot_defaults();
        Ok(())
    }

    /// Ends the current flow. The story waits for `choose_path_string`.
    pub fn reset_callstack(&mut self) -> StoryResult<()> {
        self.guard_reentry("reset_callstack")?;
        self.state.force_end();
        Ok(())
    }

    // ---- Diagnostics ----

    pub fn current_errors(&self) -> &[String] {
        &self.state.errors
    }

    pub fn current_warnings(&self) -> &[String] {
        &self.state.warnings
    }

    pub fn has_error(&self) -> bool {
        self.state.has_error()
    }

    pub fn has_warning(&self) -> bool {
        !self.state.warnings.is_empty()
    }

    /// Clears recorded errors and warnings so a stopped story can go on.
    pub fn reset_errors(&mut self) {
        self.state.errors.clear();
        self.state.warnings.clear();
        self.reported_warnings = 0;
    }

    pub fn on_error<F>(&mut self, hook: F)
    where
        F: FnMut(&str, Severity) + 'static,
    {
        self.error_hook = Some(Box::new(hook));
    }

    pub fn on_warning<F>(&mut self, hook: F)
    where
        F: FnMut(&str, Severity) + 'static,
    {
        self.warning_hook = Some(Box::new(hook));
    }

    fn report_error(&mut self, err: &StoryError) {
        error!(error = %err, "story error");
        if let Some(hook) = self.error_hook.as_mut() {
            hook(&err.to_string(), err.severity());
        }
    }

    fn report_warnings(&mut self) {
        let start = self.reported_warnings.min(self.state.warnings.len());
        for message in &self.state.warnings[start..] {
            warn!(warning = %message, "story warning");
            if let Some(hook) = self.warning_hook.as_mut() {
                hook(message, Severity::Warning);
            }
        }
        self.reported_warnings = self.state.warnings.len();
    }

    // ---- Randomness ----

    pub fn set_rng_algorithm<R>(&mut self, rng: R)
    where
        R: RngAlgorithm + 'static,
    {
        self.caps.rng = Box::new(rng);
    }

    /// Seeds `RANDOM` and shuffle sequences, now and after `reset_state`.
    pub fn set_rng_seed(&mut self, seed: i64) {
        self.initial_seed = seed;
        self.state.story_seed = seed;
        self.state.previous_random = 0;
    }
}
