//! Configuration for the mock responder.
//!
//! Defines the rule graph: resources, methods, conversations and their
//! canned responses. The graph is loaded once at startup and stays
//! immutable for the life of the process.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Port the HTTP listener binds to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Response served on unmatched requests instead of a bare 404
    #[serde(default)]
    pub default_response: Option<ResponseDefinition>,

    /// Mocked resources
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl ServerConfig {
    /// Load configuration from a YAML or JSON file.
    ///
    /// The format is picked from the file extension (`.json` parses as
    /// JSON, anything else as YAML). Verb casing is normalized before
    /// validation; an invalid rule graph refuses to load.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        let mut config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Normalize verb casing once, so request dispatch never case-folds.
    pub fn normalize(&mut self) {
        for resource in &mut self.resources {
            for method in &mut resource.methods {
                method.verb.make_ascii_uppercase();
            }
        }
    }

    /// Validate the rule graph.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen_paths = BTreeSet::new();
        for (i, resource) in self.resources.iter().enumerate() {
            resource
                .validate()
                .map_err(|e| anyhow::anyhow!("resource {} ({}): {}", i, resource.path, e))?;
            if !seen_paths.insert(&resource.path) {
                anyhow::bail!("resource {} ({}): duplicate path", i, resource.path);
            }
        }
        if let Some(default) = &self.default_response {
            default
                .validate()
                .map_err(|e| anyhow::anyhow!("default-response: {}", e))?;
        }
        Ok(())
    }
}

fn default_port() -> u16 {
    8080
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Settings {
    /// Log matched conversations
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log requests no conversation matched
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// One mocked path template and the verbs it answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Resource {
    /// Optional display name used in logs
    #[serde(default)]
    pub name: Option<String>,

    /// Path template; may contain named placeholders, e.g. `/users/{id}`
    pub path: String,

    /// Methods answered on this path, one per verb
    pub methods: Vec<Method>,
}

impl Resource {
    fn validate(&self) -> anyhow::Result<()> {
        if !self.path.starts_with('/') {
            anyhow::bail!("path must start with '/'");
        }
        if self.methods.is_empty() {
            anyhow::bail!("resource declares no methods");
        }
        let mut seen_verbs = BTreeSet::new();
        for (i, method) in self.methods.iter().enumerate() {
            method
                .validate()
                .map_err(|e| anyhow::anyhow!("method {} ({}): {}", i, method.verb, e))?;
            if !seen_verbs.insert(&method.verb) {
                anyhow::bail!("method {} ({}): duplicate verb", i, method.verb);
            }
        }
        Ok(())
    }
}

/// An HTTP verb and the ordered conversations it answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Method {
    /// Optional display name used in logs
    #[serde(default)]
    pub name: Option<String>,

    /// HTTP verb, normalized to upper case at load
    pub verb: String,

    /// Conversations in declaration order; the first match wins
    pub conversations: Vec<Conversation>,
}

impl Method {
    fn validate(&self) -> anyhow::Result<()> {
        if self.verb.is_empty() {
            anyhow::bail!("verb cannot be empty");
        }
        if self.conversations.is_empty() {
            anyhow::bail!("method declares no conversations");
        }
        for (i, conversation) in self.conversations.iter().enumerate() {
            conversation
                .validate()
                .map_err(|e| anyhow::anyhow!("conversation {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// A matchable request shape bound to its eligible responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Conversation {
    /// Constraints a request must satisfy to select this conversation
    #[serde(default)]
    pub request: RequestMatcher,

    /// Eligible responses; more than one rotates per the discipline
    pub responses: Vec<ResponseDefinition>,

    /// How to pick among the responses when several are configured
    #[serde(default)]
    pub discipline: RotationDiscipline,
}

impl Conversation {
    fn validate(&self) -> anyhow::Result<()> {
        if self.responses.is_empty() {
            anyhow::bail!("conversation declares no responses");
        }
        for (i, response) in self.responses.iter().enumerate() {
            response
                .validate()
                .map_err(|e| anyhow::anyhow!("response {}: {}", i, e))?;
        }
        match self.discipline {
            RotationDiscipline::RoundRobin => {
                if self.responses.iter().any(|r| r.when_params.is_some()) {
                    anyhow::bail!(
                        "when-params is only meaningful under the presence-keyed discipline"
                    );
                }
            }
            RotationDiscipline::PresenceKeyed => {
                let mut seen = BTreeSet::new();
                for response in &self.responses {
                    if let Some(key) = response.when_params {
                        if !seen.insert(key) {
                            anyhow::bail!("more than one response keyed when-params: {}", key);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Policy governing which response is returned when several are eligible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationDiscipline {
    /// Cycle through the responses in configured order
    #[default]
    RoundRobin,
    /// Direct lookup by whether the request carries any parameters
    PresenceKeyed,
}

/// Constraints on the shape of an incoming request.
///
/// An empty matcher only applies to requests that present no parameters
/// to match against; matching is structural equality, not a subset
/// relation, unless the subset query policy is selected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RequestMatcher {
    /// Required path parameters, matched by exact value
    #[serde(default)]
    pub path_params: BTreeMap<String, String>,

    /// Required query parameters, each with its set of accepted values
    #[serde(default)]
    pub query_params: BTreeMap<String, BTreeSet<String>>,

    /// How declared query constraints are compared against the request
    #[serde(default)]
    pub query_policy: QueryPolicy,
}

/// Query-parameter matching strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPolicy {
    /// Observed query keys must equal the declared keys in count and membership
    #[default]
    Exact,
    /// Declared constraints must hold; extra observed keys are ignored
    Subset,
}

/// A canned response: status, content type and exactly one body source.
///
/// Immutable once loaded; only its selection among siblings is stateful.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ResponseDefinition {
    /// Content-Type header value
    pub content_type: String,

    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Inline body text
    #[serde(default)]
    pub body: Option<String>,

    /// Path to a file holding the body
    #[serde(default)]
    pub body_path: Option<PathBuf>,

    /// Presence key consulted under the presence-keyed discipline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_params: Option<bool>,
}

fn default_status() -> u16 {
    200
}

impl ResponseDefinition {
    /// Validate the response definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.status < 100 || self.status > 599 {
            anyhow::bail!("invalid status code: {}", self.status);
        }
        match (&self.body, &self.body_path) {
            (Some(_), Some(_)) => anyhow::bail!("body and body-path are mutually exclusive"),
            (None, None) => anyhow::bail!("a response needs either body or body-path"),
            _ => Ok(()),
        }
    }

    /// The active body source.
    pub fn body_source(&self) -> BodySource<'_> {
        match (&self.body, &self.body_path) {
            (Some(text), _) => BodySource::Inline(text),
            (None, Some(path)) => BodySource::FileBacked(path),
            // rejected at load; treated as an empty inline body if it slips through
            (None, None) => BodySource::Inline(""),
        }
    }
}

/// Origin of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySource<'a> {
    /// Literal text held in the configuration, served with no I/O
    Inline(&'a str),
    /// File re-read in full on every request
    FileBacked(&'a Path),
}
