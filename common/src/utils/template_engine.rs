pub use minijinja::{context, path_loader, Environment, Value};
pub use minijinja_embed;
use std::sync::Arc;

pub trait ProvidesTemplateEngine {
    fn template_engine(&self) -> &Arc<TemplateEngine>;
}

/// Rendering environment for the crate's HTML templates.
///
/// Debug builds read templates from disk on every start so edits show up without
/// recompiling; release builds embed them via `minijinja_embed`.
#[derive(Clone)]
pub struct TemplateEngine {
    env: Arc<Environment<'static>>,
}

#[macro_export]
macro_rules! create_template_engine {
    // Macro takes the relative path to the templates dir as input
    ($relative_path:expr) => {{
        #[cfg(debug_assertions)]
        {
            // These lines execute in the CALLING crate's context
            let crate_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            let template_path = crate_dir.join($relative_path);
            let mut env = $crate::utils::template_engine::Environment::new();
            env.set_loader($crate::utils::template_engine::path_loader(template_path));
            $crate::utils::template_engine::TemplateEngine::new(env)
        }
        #[cfg(not(debug_assertions))]
        {
            let mut env = $crate::utils::template_engine::Environment::new();
            $crate::utils::template_engine::minijinja_embed::load_templates!(&mut env);
            $crate::utils::template_engine::TemplateEngine::new(env)
        }
    }};
}

impl TemplateEngine {
    pub fn new(env: Environment<'static>) -> Self {
        Self { env: Arc::new(env) }
    }

    pub fn render(&self, name: &str, ctx: &Value) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(ctx)
    }
}
