//! Response rotation.
//!
//! When a conversation configures more than one eligible response, the
//! rotator decides which one the current request receives: round-robin
//! over the configured order, or a direct lookup keyed by whether the
//! request carries any parameters.

use crate::config::{Conversation, ResponseDefinition, RotationDiscipline, ServerConfig};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Position of a conversation in the loaded configuration:
/// (resource, method, conversation) indices.
pub type ConversationId = (usize, usize, usize);

/// Per-conversation rotation cursors.
///
/// Built once at startup and shared by every request task; the rule
/// graph itself stays immutable and lock-free. Each cursor has its own
/// lock, held only for the read-and-increment, never across body I/O.
pub struct RotatorState {
    cursors: HashMap<ConversationId, Mutex<usize>>,
}

impl RotatorState {
    /// Allocate a cursor for every rotation-eligible conversation.
    pub fn new(config: &ServerConfig) -> Self {
        let mut cursors = HashMap::new();
        for (r, resource) in config.resources.iter().enumerate() {
            for (m, method) in resource.methods.iter().enumerate() {
                for (c, conversation) in method.conversations.iter().enumerate() {
                    if conversation.discipline == RotationDiscipline::RoundRobin
                        && conversation.responses.len() > 1
                    {
                        cursors.insert((r, m, c), Mutex::new(0));
                    }
                }
            }
        }
        Self { cursors }
    }

    /// Pick the response the current request receives.
    ///
    /// Never fails: loading rejects conversations without responses.
    pub fn next<'a>(
        &self,
        id: ConversationId,
        conversation: &'a Conversation,
        request_has_params: bool,
    ) -> &'a ResponseDefinition {
        match conversation.discipline {
            RotationDiscipline::PresenceKeyed => conversation
                .responses
                .iter()
                .find(|response| response.when_params == Some(request_has_params))
                // no response keyed for this case: fall back to the first
                // configured one, preserving the legacy default behavior
                .unwrap_or(&conversation.responses[0]),
            RotationDiscipline::RoundRobin => {
                let len = conversation.responses.len();
                let Some(cursor) = self.cursors.get(&id) else {
                    // single response, no cursor was allocated
                    return &conversation.responses[0];
                };
                // read-cursor, pick response, advance is one indivisible step;
                // a poisoned lock only means another task panicked mid-update
                // and the stored index is still usable
                let mut position = cursor.lock().unwrap_or_else(PoisonError::into_inner);
                let index = *position % len;
                *position = (index + 1) % len;
                &conversation.responses[index]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    fn config(yaml: &str) -> ServerConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn round_robin_config() -> ServerConfig {
        config(
            r#"
resources:
  - path: /poll
    methods:
      - verb: GET
        conversations:
          - responses:
              - { content-type: text/plain, body: one }
              - { content-type: text/plain, body: two }
              - { content-type: text/plain, body: three }
"#,
        )
    }

    fn body_of(response: &ResponseDefinition) -> &str {
        response.body.as_deref().unwrap()
    }

    #[test]
    fn round_robin_cycles_in_configured_order() {
        let config = round_robin_config();
        let rotator = RotatorState::new(&config);
        let conversation = &config.resources[0].methods[0].conversations[0];

        let served: Vec<&str> = (0..7)
            .map(|_| body_of(rotator.next((0, 0, 0), conversation, false)))
            .collect();
        // three consecutive requests see each response once, then it wraps
        assert_eq!(served, ["one", "two", "three", "one", "two", "three", "one"]);
    }

    #[test]
    fn single_response_needs_no_cursor() {
        let config = config(
            r#"
resources:
  - path: /one
    methods:
      - verb: GET
        conversations:
          - responses:
              - { content-type: text/plain, body: only }
"#,
        );
        let rotator = RotatorState::new(&config);
        let conversation = &config.resources[0].methods[0].conversations[0];

        assert_eq!(body_of(rotator.next((0, 0, 0), conversation, false)), "only");
        assert_eq!(body_of(rotator.next((0, 0, 0), conversation, true)), "only");
    }

    #[test]
    fn cursors_are_scoped_per_conversation() {
        let config = config(
            r#"
resources:
  - path: /a
    methods:
      - verb: GET
        conversations:
          - responses:
              - { content-type: text/plain, body: a1 }
              - { content-type: text/plain, body: a2 }
  - path: /b
    methods:
      - verb: GET
        conversations:
          - responses:
              - { content-type: text/plain, body: b1 }
              - { content-type: text/plain, body: b2 }
"#,
        );
        let rotator = RotatorState::new(&config);
        let a = &config.resources[0].methods[0].conversations[0];
        let b = &config.resources[1].methods[0].conversations[0];

        assert_eq!(body_of(rotator.next((0, 0, 0), a, false)), "a1");
        // advancing /a leaves /b's cursor untouched
        assert_eq!(body_of(rotator.next((1, 0, 0), b, false)), "b1");
        assert_eq!(body_of(rotator.next((0, 0, 0), a, false)), "a2");
    }

    #[test]
    fn presence_keyed_looks_up_by_boolean() {
        let config = config(
            r#"
resources:
  - path: /users/{id}
    methods:
      - verb: GET
        conversations:
          - discipline: presence_keyed
            responses:
              - { content-type: text/plain, body: with-params, when-params: true }
              - { content-type: text/plain, body: without-params, when-params: false }
"#,
        );
        let rotator = RotatorState::new(&config);
        let conversation = &config.resources[0].methods[0].conversations[0];

        assert_eq!(
            body_of(rotator.next((0, 0, 0), conversation, true)),
            "with-params"
        );
        assert_eq!(
            body_of(rotator.next((0, 0, 0), conversation, false)),
            "without-params"
        );
    }

    #[test]
    fn presence_keyed_falls_back_to_first_response() {
        let config = config(
            r#"
resources:
  - path: /users/{id}
    methods:
      - verb: GET
        conversations:
          - discipline: presence_keyed
            responses:
              - { content-type: text/plain, body: first }
              - { content-type: text/plain, body: keyed, when-params: true }
"#,
        );
        let rotator = RotatorState::new(&config);
        let conversation = &config.resources[0].methods[0].conversations[0];

        assert_eq!(body_of(rotator.next((0, 0, 0), conversation, true)), "keyed");
        // no response keyed false: the first configured one is served
        assert_eq!(body_of(rotator.next((0, 0, 0), conversation, false)), "first");
    }

    #[test]
    fn concurrent_callers_split_the_rotation_evenly() {
        let config = Arc::new(round_robin_config());
        let rotator = Arc::new(RotatorState::new(&config));
        let tallies: Arc<[AtomicUsize; 3]> = Arc::new(Default::default());

        const CALLERS: usize = 99;
        let barrier = Arc::new(Barrier::new(CALLERS));
        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let config = config.clone();
                let rotator = rotator.clone();
                let tallies = tallies.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let conversation = &config.resources[0].methods[0].conversations[0];
                    barrier.wait();
                    let response = rotator.next((0, 0, 0), conversation, false);
                    let slot = match body_of(response) {
                        "one" => 0,
                        "two" => 1,
                        _ => 2,
                    };
                    tallies[slot].fetch_add(1, Ordering::Relaxed);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // the read-and-increment is indivisible, so 99 calls over 3
        // responses serve each exactly 33 times
        for tally in tallies.iter() {
            assert_eq!(tally.load(Ordering::Relaxed), CALLERS / 3);
        }
    }
}
