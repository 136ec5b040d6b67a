use handlebars::{Handlebars, no_escape};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TEngineError {
    #[error("Template error: {0}")]
    TemplateError(#[from] handlebars::TemplateError),
    #[error("Render error: {0}")]
    RenderError(#[from] handlebars::RenderError),
}

/// Thin wrapper over `handlebars` with HTML escaping turned off and strict
/// variable lookup, so a missing placeholder is an error instead of blank text.
pub struct TEngine {
    handlebars: Handlebars<'static>,
}

impl Default for TEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(no_escape);
        handlebars.set_strict_mode(true);
        TEngine { handlebars }
    }

    pub fn register_template_string(
        &mut self,
        name: &str,
        template: &str,
    ) -> Result<(), TEngineError> {
        self.handlebars.register_template_string(name, template)?;
        Ok(())
    }

    /// Renders a template previously registered under `name`.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, TEngineError> {
        Ok(self.handlebars.render(name, data)?)
    }

    pub fn render_template(
        &self,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<String, TEngineError> {
        let result = self.handlebars.render_template(template, data)?;
        Ok(result)
    }
}
