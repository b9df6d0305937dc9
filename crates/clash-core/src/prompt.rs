//! Prompt template loading and rendering via `minijinja`.
//!
//! Four templates make up every prompt the debate sends:
//!
//! - `system.j2` -- the shared rules block (length, potency format, topics)
//! - `first_move.j2` -- the opening "argue in favour" framing
//! - `reply.j2` -- the "refute and support" framing quoting the opponent
//! - `validation.j2` -- the topical alignment question
//!
//! Defaults are compiled into the binary. An operator can override them by
//! pointing [`PromptEngine::from_dir`] at a directory with the same files.

use std::path::Path;

use minijinja::{Environment, context};

use clash_types::Team;

/// Template names and their built-in sources.
const TEMPLATES: [(&str, &str); 4] = [
    ("system", include_str!("../templates/system.j2")),
    ("first_move", include_str!("../templates/first_move.j2")),
    ("reply", include_str!("../templates/reply.j2")),
    ("validation", include_str!("../templates/validation.j2")),
];

/// Template loading or rendering failed.
#[derive(Debug, thiserror::Error)]
#[error("prompt template error: {0}")]
pub struct PromptError(String);

/// A rendered prompt ready to send to a generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// The rules block.
    pub system: String,
    /// The move framing.
    pub user: String,
}

/// Everything a move prompt needs.
#[derive(Debug, Clone, Copy)]
pub struct MoveContext<'a> {
    /// The team about to move.
    pub team: Team,
    /// Red's topic.
    pub red_topic: &'a str,
    /// Blue's topic.
    pub blue_topic: &'a str,
    /// The opponent's last accepted message. `None` for the opening move.
    pub previous: Option<&'a str>,
    /// Minimum accepted word count.
    pub word_min: u32,
    /// Maximum accepted word count.
    pub word_max: u32,
}

impl MoveContext<'_> {
    fn own_topic(&self) -> &str {
        match self.team {
            Team::Red => self.red_topic,
            Team::Blue => self.blue_topic,
        }
    }
}

/// Renders debate prompts.
#[derive(Debug)]
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Build an engine from the compiled-in templates.
    pub fn builtin() -> Result<Self, PromptError> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| PromptError(format!("failed to add {name} template: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Build an engine from `<dir>/<name>.j2` files.
    ///
    /// Every template must be present; a partial override is an error.
    pub fn from_dir(dir: &Path) -> Result<Self, PromptError> {
        let mut env = Environment::new();
        for (name, _) in TEMPLATES {
            let source = load_template(dir, name)?;
            env.add_template_owned(name, source)
                .map_err(|e| PromptError(format!("failed to add {name} template: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Render the prompt for one move.
    ///
    /// Uses the opening framing when there is no previous message and the
    /// reply framing otherwise.
    pub fn render_move(&self, ctx: &MoveContext<'_>) -> Result<RenderedPrompt, PromptError> {
        let system = self.render(
            "system",
            context! {
                red_topic => ctx.red_topic,
                blue_topic => ctx.blue_topic,
                word_min => ctx.word_min,
                word_max => ctx.word_max,
            },
        )?;

        let user = match ctx.previous {
            None => self.render(
                "first_move",
                context! {
                    team => ctx.team.as_str(),
                    topic => ctx.own_topic(),
                },
            )?,
            Some(previous) => self.render(
                "reply",
                context! {
                    team => ctx.team.as_str(),
                    opponent => ctx.team.opponent().as_str(),
                    previous => previous,
                    topic => ctx.own_topic(),
                },
            )?,
        };

        Ok(RenderedPrompt { system, user })
    }

    /// Render the topical validation question.
    pub fn render_validation(&self, text: &str, topic: &str) -> Result<String, PromptError> {
        self.render("validation", context! { text => text, topic => topic })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String, PromptError> {
        self.env
            .get_template(name)
            .map_err(|e| PromptError(format!("missing {name} template: {e}")))?
            .render(ctx)
            .map_err(|e| PromptError(format!("{name} render failed: {e}")))
    }
}

/// Read a template file from disk.
fn load_template(dir: &Path, name: &str) -> Result<String, PromptError> {
    let path = dir.join(format!("{name}.j2"));
    std::fs::read_to_string(&path)
        .map_err(|e| PromptError(format!("failed to read {}: {e}", path.display())))
}
