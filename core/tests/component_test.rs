//! Tests for the rule-based component policy.

use async_trait::async_trait;
use uxsim_core::policy::component::{
    ActionSelector, CompositeActionSelector, IntentQueryGenerator, StopOnRelevanceSelector,
    VariationQueryGenerator,
};
use uxsim_core::{
    Action, AgentContext, ComponentConfig, ComponentPolicy, DecisionPolicy, MemoryKind,
    MemoryStore, Observation, Persona,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn persona() -> Persona {
    Persona::new("Sam", "Weekend hiker", "I want to find waterproof hiking boots")
}

fn script() -> Vec<Observation> {
    vec![
        Observation::new("http://shop/", "Welcome").with_clickable("deals", "Deals"),
        Observation::new("http://shop/s", "Results")
            .with_clickable("r1", "Leather sandals")
            .with_clickable("r2", "Waterproof hiking boots"),
        Observation::new("http://shop/p/r2", "Product page"),
        Observation::new("http://shop/p/r2/reviews", "Reviews")
            .with_clickable("back", "Back"),
    ]
}

async fn replay(policy: &mut dyn DecisionPolicy, observations: &[Observation]) -> Vec<Action> {
    let persona = persona();
    let memory = MemoryStore::new();
    let mut plan = None;
    let mut actions = Vec::new();
    for obs in observations {
        let ctx = AgentContext {
            persona: &persona,
            memory: &memory,
            plan: &mut plan,
        };
        actions.push(policy.decide(ctx, obs).await.unwrap());
    }
    actions
}

/// Clicks the first element the agent has not clicked before, going by the
/// action log in memory.
struct UnvisitedSelector;

#[async_trait]
impl ActionSelector for UnvisitedSelector {
    async fn select_action(
        &self,
        _persona: &Persona,
        observation: &Observation,
        memory: &MemoryStore,
    ) -> Option<Action> {
        let log: Vec<String> = memory
            .of_kind(MemoryKind::Action)
            .into_iter()
            .map(|e| e.content)
            .collect();
        observation
            .clickables
            .iter()
            .map(|c| Action::click(&c.id))
            .find(|a| !log.iter().any(|line| line.ends_with(&a.describe())))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_fresh_policies_agree() {
    let observations = script();
    let mut a = ComponentPolicy::default();
    let mut b = ComponentPolicy::default();

    let first = replay(&mut a, &observations).await;
    let second = replay(&mut b, &observations).await;
    assert_eq!(first, second);

    assert_eq!(first[0], Action::search("waterproof hiking boots"));
    assert_eq!(first[1], Action::click("r2"));
    // No clickables: fall back to searching again
    assert_eq!(first[2], Action::search("waterproof hiking boots"));
    assert_eq!(first[3], Action::click("back"));
}

#[tokio::test]
async fn test_reset_replays_identically() {
    let observations = script();
    let mut policy = ComponentPolicy::default();

    let first = replay(&mut policy, &observations).await;
    assert_eq!(policy.steps_taken(), 4);

    policy.reset();
    assert_eq!(policy.steps_taken(), 0);
    let second = replay(&mut policy, &observations).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_relevance_check_can_be_disabled() {
    let relevant = Observation::new("http://shop/p", "Waterproof hiking boots in stock")
        .with_clickable("buy", "Buy now");
    let observations = vec![relevant.clone(), relevant];

    let mut checking = ComponentPolicy::default();
    let actions = replay(&mut checking, &observations).await;
    assert_eq!(actions[1].reason(), Some("Found relevant content"));

    let mut blind = ComponentPolicy::new(ComponentConfig {
        use_relevance_check: false,
        ..Default::default()
    });
    let actions = replay(&mut blind, &observations).await;
    assert_eq!(actions[1], Action::click("buy"));
}

#[tokio::test]
async fn test_custom_components() {
    let mut policy = ComponentPolicy::default()
        .with_query_generator(Box::new(VariationQueryGenerator::new(Box::new(
            IntentQueryGenerator,
        ))))
        .with_action_selector(Box::new(CompositeActionSelector::new(vec![Box::new(
            StopOnRelevanceSelector::default(),
        )])));

    let empty = Observation::new("http://shop/", "Nothing here");
    let actions = replay(&mut policy, &[empty.clone(), empty]).await;
    assert_eq!(actions[0], Action::search("waterproof hiking boots"));
    assert_eq!(actions[1], Action::search("waterproof hiking boots reviews"));
}

#[tokio::test]
async fn test_selector_reads_action_log() {
    let mut policy = ComponentPolicy::new(ComponentConfig {
        use_relevance_check: false,
        ..Default::default()
    })
    .with_action_selector(Box::new(UnvisitedSelector));

    let results = Observation::new("http://shop/s", "Results")
        .with_clickable("r1", "Leather sandals")
        .with_clickable("r2", "Waterproof hiking boots");
    let observations = vec![
        Observation::new("http://shop/", "Welcome"),
        results.clone(),
        results.clone(),
        results,
    ];
    let actions = replay(&mut policy, &observations).await;

    assert_eq!(actions[1], Action::click("r1"));
    assert_eq!(actions[2], Action::click("r2"));
    // Both visited: nothing left to select or search
    assert!(actions[3].is_stop());
}

#[tokio::test]
async fn test_zero_max_steps_stops_immediately() {
    let mut policy = ComponentPolicy::new(ComponentConfig {
        max_steps: 0,
        ..Default::default()
    });
    let actions = replay(&mut policy, &script()[..1]).await;
    assert_eq!(actions[0].reason(), Some("Maximum steps reached"));
}
