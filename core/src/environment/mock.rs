use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Environment;
use crate::types::{Action, ActionKind, Clickable, InputField, Observation, SelectField};
use crate::Result;

const END_URL: &str = "http://mock.com/end";
const END_CONTENT: &str = "End of mock pages";

fn default_clickables() -> Vec<Clickable> {
    vec![Clickable {
        id: "link1".into(),
        text: "Click me".into(),
    }]
}

/// One scripted page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockPage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_clickables")]
    pub clickables: Vec<Clickable>,
    #[serde(default)]
    pub inputs: Vec<InputField>,
    #[serde(default)]
    pub selects: Vec<SelectField>,
}

impl MockPage {
    /// Page with a single generic link, like a page scripted without clickables.
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            content: content.into(),
            clickables: default_clickables(),
            inputs: Vec::new(),
            selects: Vec::new(),
        }
    }

    pub fn with_clickables(mut self, clickables: Vec<Clickable>) -> Self {
        self.clickables = clickables;
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<InputField>) -> Self {
        self.inputs = inputs;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockEnvironmentConfig {
    pub pages: Vec<MockPage>,
    /// Steps after which every observation carries an error message
    pub max_steps: u32,
}

impl Default for MockEnvironmentConfig {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            max_steps: 10,
        }
    }
}

/// Scripted environment: advances one page on click, search and type.
#[derive(Debug, Clone)]
pub struct MockEnvironment {
    config: MockEnvironmentConfig,
    step_count: u32,
    page_index: usize,
}

impl MockEnvironment {
    pub fn new(config: MockEnvironmentConfig) -> Self {
        Self {
            config,
            step_count: 0,
            page_index: 0,
        }
    }

    pub fn with_pages(pages: Vec<MockPage>) -> Self {
        Self::new(MockEnvironmentConfig {
            pages,
            ..Default::default()
        })
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    fn current(&self) -> Observation {
        match self.config.pages.get(self.page_index) {
            Some(page) => Observation {
                url: page
                    .url
                    .clone()
                    .unwrap_or_else(|| format!("http://mock.com/page{}", self.page_index)),
                page_content: page.content.clone(),
                clickables: page.clickables.clone(),
                inputs: page.inputs.clone(),
                selects: page.selects.clone(),
                ..Default::default()
            },
            None => Observation::new(END_URL, END_CONTENT),
        }
    }
}

#[async_trait]
impl Environment for MockEnvironment {
    async fn reset(&mut self) -> Result<Observation> {
        self.step_count = 0;
        self.page_index = 0;
        Ok(self.current())
    }

    async fn observe(&mut self) -> Result<Observation> {
        Ok(self.current())
    }

    async fn step(&mut self, action: &Action) -> Result<Observation> {
        self.step_count += 1;
        if matches!(
            action.kind,
            ActionKind::Click | ActionKind::Search | ActionKind::Type
        ) {
            self.page_index += 1;
        }
        debug!(
            target = "environment.mock",
            step = self.step_count,
            page = self.page_index,
            action = %action.kind,
            "Mock step"
        );

        let mut observation = self.current();
        if self.step_count > self.config.max_steps {
            observation.error_message = Some("Mock environment reached max steps".into());
        }
        Ok(observation)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
