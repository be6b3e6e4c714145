//! Request matching logic.
//!
//! Decides which configured conversation, if any, answers an incoming
//! request. Matching is pure: these functions only read the rule graph
//! and the parameters the router extracted from the live request.

use crate::config::{Conversation, Method, QueryPolicy, Resource};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Returns true iff the declared and extracted path parameters agree
/// exactly: identical key sets and equal values. No wildcards, no case
/// folding.
pub fn path_matches(
    declared: &BTreeMap<String, String>,
    extracted: &HashMap<String, String>,
) -> bool {
    declared.len() == extracted.len()
        && declared
            .iter()
            .all(|(name, value)| extracted.get(name).is_some_and(|v| v == value))
}

/// Returns true iff every declared query constraint is satisfied: the
/// declared name is present and every value the client supplied for it
/// belongs to the accepted set (a query key may legally repeat).
///
/// Under [`QueryPolicy::Exact`] the observed key set must additionally
/// equal the declared key set in count and membership; under
/// [`QueryPolicy::Subset`] extra observed keys are ignored.
pub fn query_matches(
    declared: &BTreeMap<String, BTreeSet<String>>,
    observed: &HashMap<String, Vec<String>>,
    policy: QueryPolicy,
) -> bool {
    if policy == QueryPolicy::Exact
        && (declared.len() != observed.len()
            || !observed.keys().all(|name| declared.contains_key(name)))
    {
        return false;
    }
    declared.iter().all(|(name, accepted)| {
        observed
            .get(name)
            .is_some_and(|values| values.iter().all(|value| accepted.contains(value)))
    })
}

/// Find the configured method answering `verb` on a resource.
///
/// Verbs are uppercased at load, so the comparison ignores the casing of
/// the live request's verb. `None` means the request is unanswerable on
/// this resource, a normal not-found outcome.
pub fn find_method<'a>(resource: &'a Resource, verb: &str) -> Option<(usize, &'a Method)> {
    resource
        .methods
        .iter()
        .enumerate()
        .find(|(_, method)| method.verb.eq_ignore_ascii_case(verb))
}

/// Select the conversation answering a request routed to `method`.
///
/// Candidates are considered in declaration order and the first match
/// wins, so authors can list specific rules before general fallbacks.
/// A conversation declaring path parameters never matches a
/// parameterless request and vice versa; surviving candidates are then
/// matched by path-parameter value. Requests without query parameters
/// take the first candidate that declares no query constraints; requests
/// with query parameters are matched per each candidate's query policy.
///
/// `None` is the expected no-match outcome, not an error.
pub fn select_conversation<'a>(
    method: &'a Method,
    path_params: &HashMap<String, String>,
    query: &HashMap<String, Vec<String>>,
) -> Option<(usize, &'a Conversation)> {
    let mut candidates = method
        .conversations
        .iter()
        .enumerate()
        .filter(|(_, conversation)| {
            let declared = &conversation.request.path_params;
            declared.is_empty() == path_params.is_empty() && path_matches(declared, path_params)
        });

    if query.is_empty() {
        candidates.find(|(_, conversation)| conversation.request.query_params.is_empty())
    } else {
        candidates.find(|(_, conversation)| {
            query_matches(
                &conversation.request.query_params,
                query,
                conversation.request.query_policy,
            )
        })
    }
}

/// Parse a raw query string into name → values, preserving repeated keys.
pub fn parse_query(query: &str) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        let (name, value) = match part.split_once('=') {
            Some((name, value)) => (percent_decode(name), percent_decode(value)),
            None => (percent_decode(part), String::new()),
        };
        params.entry(name).or_default().push(value);
    }

    params
}

/// Simple URL decoding.
fn percent_decode(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    result.push(byte as char);
                    continue;
                }
            }
            result.push('%');
            result.push_str(&hex);
        } else if ch == '+' {
            result.push(' ');
        } else {
            result.push(ch);
        }
    }

    result
}
