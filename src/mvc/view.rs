//! Implicit view rendering.
//!
//! # Responsibilities
//! - Define the view collaborator (`View`) and its output buffer
//! - Guarantee `finish` runs exactly once per `start` (`ViewScope`)
//! - Provide a file-based renderer (`TemplateView`)
//!
//! # Design Decisions
//! - The buffer is an explicit value returned by `start` and handed back to
//!   `finish`; no global output state
//! - `ViewScope` finishes the buffer on drop, covering every early return
//! - Missing templates render nothing

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::ViewConfig;
use crate::mvc::dispatcher::ViewVars;
use crate::mvc::error::ViewError;

/// Captured view output.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct OutputBuffer {
    content: String,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, chunk: &str) {
        self.content.push_str(chunk);
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

/// The view collaborator.
pub trait View: Send {
    /// Begin capturing output.
    fn start(&mut self) -> OutputBuffer {
        OutputBuffer::new()
    }

    /// Render the template for `controller`/`action` into `buffer`.
    fn render(
        &mut self,
        buffer: &mut OutputBuffer,
        controller: &str,
        action: &str,
        vars: &ViewVars,
    ) -> Result<(), ViewError>;

    /// Stop capturing and return the captured content.
    fn finish(&mut self, buffer: OutputBuffer) -> String {
        buffer.into_content()
    }
}

/// An open output buffer bound to its view.
///
/// Dropping the scope without calling [`ViewScope::finish`] still finishes
/// the buffer (the content is discarded).
pub struct ViewScope<'v> {
    view: &'v mut dyn View,
    buffer: Option<OutputBuffer>,
}

impl<'v> ViewScope<'v> {
    pub fn start(view: &'v mut dyn View) -> Self {
        let buffer = view.start();
        Self {
            view,
            buffer: Some(buffer),
        }
    }

    pub fn view(&self) -> &dyn View {
        &*self.view
    }

    pub fn render(&mut self, controller: &str, action: &str, vars: &ViewVars) -> Result<(), ViewError> {
        match self.buffer.as_mut() {
            Some(buffer) => self.view.render(buffer, controller, action, vars),
            None => Ok(()),
        }
    }

    /// Finish the buffer and return the rendered content.
    pub fn finish(mut self) -> String {
        match self.buffer.take() {
            Some(buffer) => self.view.finish(buffer),
            None => String::new(),
        }
    }
}

impl Drop for ViewScope<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            let discarded = self.view.finish(buffer);
            tracing::trace!(bytes = discarded.len(), "View buffer released without use");
        }
    }
}

/// Renders `{views_dir}/{controller}/{action}.{extension}`.
///
/// `{{ name }}` placeholders are replaced with view variables; strings are
/// HTML-escaped, other values use their JSON form.
#[derive(Debug, Clone)]
pub struct TemplateView {
    views_dir: PathBuf,
    extension: String,
}

impl TemplateView {
    pub fn new(views_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            views_dir: views_dir.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &ViewConfig) -> Self {
        Self::new(config.views_dir.clone(), config.extension.clone())
    }

    pub fn template_path(&self, controller: &str, action: &str) -> PathBuf {
        self.views_dir
            .join(controller)
            .join(format!("{}.{}", action, self.extension))
    }

    pub fn views_dir(&self) -> &Path {
        &self.views_dir
    }
}

impl View for TemplateView {
    fn render(
        &mut self,
        buffer: &mut OutputBuffer,
        controller: &str,
        action: &str,
        vars: &ViewVars,
    ) -> Result<(), ViewError> {
        let path = self.template_path(controller, action);
        if !path.is_file() {
            tracing::debug!(path = ?path, "No template for action");
            return Ok(());
        }

        let source = std::fs::read_to_string(&path).map_err(|source| ViewError::Template {
            path: path.clone(),
            source,
        })?;
        buffer.write(&interpolate(&source, vars));
        Ok(())
    }
}

fn interpolate(source: &str, vars: &ViewVars) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = rest[open + 2..open + 2 + close].trim();
        match vars.get(name) {
            Some(Value::String(s)) => out.push_str(&escape_html(s)),
            Some(Value::Null) | None => {}
            Some(other) => out.push_str(&other.to_string()),
        }
        rest = &rest[open + 2 + close + 2..];
    }

    out.push_str(rest);
    out
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct Counting(Arc<Mutex<Vec<&'static str>>>);

    impl View for Counting {
        fn start(&mut self) -> OutputBuffer {
            self.0.lock().unwrap().push("start");
            OutputBuffer::new()
        }

        fn render(&mut self, buffer: &mut OutputBuffer, _: &str, _: &str, _: &ViewVars) -> Result<(), ViewError> {
            buffer.write("rendered");
            Ok(())
        }

        fn finish(&mut self, buffer: OutputBuffer) -> String {
            self.0.lock().unwrap().push("finish");
            buffer.into_content()
        }
    }

    #[test]
    fn test_scope_finishes_on_drop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut view = Counting(log.clone());
        {
            let _scope = ViewScope::start(&mut view);
        }
        assert_eq!(*log.lock().unwrap(), vec!["start", "finish"]);
    }

    #[test]
    fn test_scope_finish_returns_content_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut view = Counting(log.clone());

        let mut scope = ViewScope::start(&mut view);
        scope.render("c", "a", &ViewVars::new()).unwrap();
        assert_eq!(scope.finish(), "rendered");
        assert_eq!(*log.lock().unwrap(), vec!["start", "finish"]);
    }

    #[test]
    fn test_interpolate() {
        let mut vars = ViewVars::new();
        vars.insert("title".into(), json!("<Hi>"));
        vars.insert("count".into(), json!(3));

        assert_eq!(
            interpolate("<h1>{{ title }}</h1>{{count}}{{ missing }}", &vars),
            "<h1>&lt;Hi&gt;</h1>3"
        );
        assert_eq!(interpolate("open {{ never closed", &vars), "open {{ never closed");
    }

    #[test]
    fn test_template_view_renders_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("posts")).unwrap();
        std::fs::write(dir.path().join("posts/show.html"), "Post {{ id }}").unwrap();

        let mut view = TemplateView::new(dir.path(), "html");
        let mut vars = ViewVars::new();
        vars.insert("id".into(), json!(7));

        let mut scope = ViewScope::start(&mut view);
        scope.render("posts", "show", &vars).unwrap();
        scope.render("posts", "missing", &vars).unwrap();
        assert_eq!(scope.finish(), "Post 7");
    }
}
