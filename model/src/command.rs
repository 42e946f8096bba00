use util::HashMap;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("unknown application '{0}'")]
    UnknownApplication(String),
    #[error("missing required parameter '{field}'")]
    MissingParameter { field: &'static str },
    #[error("invalid value '{value}' for parameter '{field}'")]
    InvalidParameterValue { field: &'static str, value: String },
}

/// One registered application: validates a stage's parameters and
/// assembles the literal invocation line for its binary.
/// New applications implement this trait and register themselves
/// with [`Registry::register`]; nothing else in the pipeline needs
/// to know about their internals.
pub trait Application: Send + Sync {
    /// Identifier stages use to select this application (`app = ...`).
    fn id(&self) -> &'static str;

    /// Validate `params` and produce the command line to run.
    /// Params arrive in definition-file order, so the assembled
    /// command is deterministic for a given definition.
    fn build(&self, params: &[(String, String)]) -> Result<String, CommandError>;
}

/// Lookup table from application identifier to its command builder.
pub struct Registry {
    apps: HashMap<&'static str, Box<dyn Application>>,
}

impl Registry {
    /// An empty registry with no applications.
    pub fn empty() -> Self {
        Self {
            apps: HashMap::default(),
        }
    }

    /// Register an application, replacing any previous registration
    /// with the same id.
    pub fn register(&mut self, app: Box<dyn Application>) {
        self.apps.insert(app.id(), app);
    }

    /// Build the command line for the given application id.
    pub fn build(
        &self,
        app_id: &str,
        params: &[(String, String)],
    ) -> Result<String, CommandError> {
        let app = self
            .apps
            .get(app_id)
            .ok_or_else(|| CommandError::UnknownApplication(app_id.to_owned()))?;
        app.build(params)
    }

    /// True if an application with the given id is registered.
    pub fn contains(&self, app_id: &str) -> bool {
        self.apps.contains_key(app_id)
    }
}

impl Default for Registry {
    /// Registry with all bundled applications registered.
    fn default() -> Self {
        let mut reg = Self::empty();
        reg.register(Box::new(crate::CoyoteApp::default()));
        reg
    }
}
