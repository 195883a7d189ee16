mod config;
use config::SimRunnerConfig;
use std::sync::Arc;
use tracing::{error, info};
use uxsim_core::{
    Agent, Clickable, CompletionService, Embedder, InputField, LlmClient, MockEnvironment,
    MockPage, Persona, SimulationRunner,
};

fn demo_persona() -> Persona {
    Persona::new(
        "Maya",
        "Maya is a 34-year-old nurse who shops online in short breaks between shifts.",
        "I want to find comfortable running shoes under $100",
    )
    .with_age(34)
    .with_gender("female")
    .with_income(50_000, 75_000)
}

fn demo_pages() -> Vec<MockPage> {
    vec![
        MockPage::new("http://shop.example/", "Welcome to the shoe shop")
            .with_inputs(vec![InputField {
                id: "search".into(),
                kind: "search".into(),
                placeholder: "Search products".into(),
            }])
            .with_clickables(vec![
                Clickable {
                    id: "nav-running".into(),
                    text: "Running shoes".into(),
                },
                Clickable {
                    id: "nav-boots".into(),
                    text: "Boots".into(),
                },
            ]),
        MockPage::new(
            "http://shop.example/search?q=running+shoes",
            "Results for running shoes: comfortable trail and road running shoes",
        )
        .with_clickables(vec![
            Clickable {
                id: "result-1".into(),
                text: "Comfortable road running shoes $89".into(),
            },
            Clickable {
                id: "result-2".into(),
                text: "Leather boots $140".into(),
            },
        ]),
        MockPage::new(
            "http://shop.example/p/road-runner",
            "Comfortable road running shoes under $100, free returns",
        ),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    uxsim_core::telemetry::init_tracing("info,uxsim_core=info,sim_runner=info");

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = SimRunnerConfig::load();
    info!(
        target = "sim_runner",
        policy = cfg.simulation.policy.name(),
        max_steps = cfg.simulation.max_steps,
        "Starting simulation demo"
    );

    let persona = match &cfg.persona_path {
        Some(path) => {
            let text = tokio::fs::read_to_string(path).await?;
            Persona::from_json_str(&text)?
        }
        None => demo_persona(),
    };

    let mut env_cfg = cfg.simulation.environment.clone();
    if env_cfg.pages.is_empty() {
        env_cfg.pages = demo_pages();
    }
    let environment = MockEnvironment::new(env_cfg);

    // One client serves both completions and embeddings
    let (llm, embedder): (Option<Arc<dyn CompletionService>>, Option<Arc<dyn Embedder>>) =
        if cfg.uses_llm() {
            let client = Arc::new(LlmClient::new(cfg.llm.clone())?);
            let llm: Arc<dyn CompletionService> = client.clone();
            let embedder: Arc<dyn Embedder> = client;
            (Some(llm), Some(embedder))
        } else {
            (None, None)
        };
    let policy = cfg.simulation.policy.build(llm, embedder)?;

    let agent = Agent::builder()
        .persona(persona)
        .boxed_policy(policy)
        .build()?;
    let runner = SimulationRunner::builder()
        .config(cfg.simulation.clone())
        .agent(agent)
        .environment(environment)
        .build()?;

    let outcome = match runner.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(target = "sim_runner", error = %e, "Simulation failed");
            return Err(e.into());
        }
    };

    for record in &outcome.steps {
        info!(
            target = "sim_runner",
            step = record.step,
            url = %record.observation.url,
            action = %record.action.describe(),
            "Trace"
        );
    }
    if let Some(dir) = &outcome.artifact_dir {
        info!(target = "sim_runner", dir = %dir.display(), "Artifacts written");
    }

    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
    Ok(())
}
