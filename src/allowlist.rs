//! Operation allowlisting
//!
//! Restricts which GraphQL operations may pass through the proxy. The
//! inbound request body is classified as a named query or mutation by
//! inspecting the leading tokens of the operation text, then checked against
//! a fixed set of permitted operation names.
//!
//! # Admission rules
//!
//! - **Queries** are admitted if the operation text contains any allowed
//!   query name as a substring. This is intentionally loose and preserved
//!   for compatibility with existing credential issuers; a query named
//!   `shopDetails` matches the allowed name `shop`. See DESIGN.md.
//! - **Mutations** are admitted only if the resolved operation name exactly
//!   matches an allowed mutation name.
//! - Anything that is not a query or mutation (subscriptions, unparseable
//!   text) is rejected. Classification fails closed.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Leading tokens of a GraphQL document: optional `query`/`mutation`
/// keyword, optional operation name, opening brace
fn leading_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^\s*(query|mutation)?\s*(\w+)?\s*\{").expect("invalid leading token pattern")
    })
}

/// First identifier immediately following an opening brace, used as the
/// fallback mutation name for anonymous mutations
fn brace_name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\{\s*(\w+)").expect("invalid brace name pattern"))
}

/// A GraphQL request body as sent by the caller
///
/// The proxy only reads this; the raw body text is what gets forwarded
/// upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQlRequestBody {
    /// The GraphQL operation text
    pub query: String,

    /// Optional explicit operation name
    #[serde(rename = "operationName", default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,

    /// Optional operation variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

impl GraphQlRequestBody {
    /// Parse a raw request body
    ///
    /// Fails with [`Error::MalformedRequest`] if the body is not valid JSON
    /// or lacks a `query` field.
    pub fn from_raw(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::MalformedRequest(e.to_string()))
    }

    /// Build from an already-parsed JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::MalformedRequest(e.to_string()))
    }
}

/// Kind of GraphQL operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

/// Result of classifying a request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: OperationKind,
    /// Operation name from the leading tokens, falling back to the body's
    /// `operationName` field
    pub name: Option<String>,
}

/// Static sets of permitted query and mutation operation names
///
/// Defined at build/deploy time and passed explicitly to the classifier so
/// tests can substitute smaller sets.
#[derive(Debug, Clone, Default)]
pub struct AllowedOperations {
    queries: HashSet<String>,
    mutations: HashSet<String>,
}

impl AllowedOperations {
    /// Create an empty allowlist (everything rejected)
    pub fn new() -> Self {
        Self::default()
    }

    /// The operation set this proxy ships with: shop/app introspection
    /// queries and the Shopify billing mutations
    pub fn shopify_billing() -> Self {
        Self::new()
            .allow_queries(["shop", "app", "oneTimePurchase"])
            .allow_mutations([
                "appSubscriptionCreate",
                "appSubscriptionCancel",
                "appSubscriptionTrialExtend",
                "appUsageRecordCreate",
                "appSubscriptionLineItemUpdate",
                "appPurchaseOneTimeCreate",
                "webhookSubscriptionCreate",
                "webhookSubscriptionDelete",
            ])
    }

    /// Add an allowed query name
    pub fn allow_query(mut self, name: impl Into<String>) -> Self {
        self.queries.insert(name.into());
        self
    }

    /// Add multiple allowed query names
    pub fn allow_queries<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.queries.insert(name.into());
        }
        self
    }

    /// Add an allowed mutation name
    pub fn allow_mutation(mut self, name: impl Into<String>) -> Self {
        self.mutations.insert(name.into());
        self
    }

    /// Add multiple allowed mutation names
    pub fn allow_mutations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.mutations.insert(name.into());
        }
        self
    }

    /// Number of allowed query names
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Number of allowed mutation names
    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }
}

/// Classifies request bodies and decides admission against an
/// [`AllowedOperations`] set
#[derive(Debug, Clone)]
pub struct OperationClassifier {
    allowed: AllowedOperations,
}

impl OperationClassifier {
    /// Create a classifier over a fixed allowlist
    pub fn new(allowed: AllowedOperations) -> Self {
        Self { allowed }
    }

    /// Classify the operation text into kind and name
    ///
    /// An absent keyword defaults to [`OperationKind::Query`]. A name absent
    /// from the leading tokens falls back to the body's `operationName`.
    /// Returns `None` when the leading pattern does not match at all
    /// (malformed or empty operation text).
    pub fn classify(&self, body: &GraphQlRequestBody) -> Option<Classification> {
        let captures = leading_regex().captures(&body.query)?;

        let kind = match captures.get(1).map(|m| m.as_str()) {
            Some("mutation") => OperationKind::Mutation,
            _ => OperationKind::Query,
        };
        let name = captures
            .get(2)
            .map(|m| m.as_str().to_string())
            .or_else(|| body.operation_name.clone());

        Some(Classification { kind, name })
    }

    /// Decide admission for a request body
    ///
    /// Fails closed: unclassifiable bodies are not allowed.
    pub fn is_allowed(&self, body: &GraphQlRequestBody) -> bool {
        let Some(classification) = self.classify(body) else {
            tracing::debug!("operation text did not match the leading pattern, rejecting");
            return false;
        };

        match classification.kind {
            OperationKind::Query => self
                .allowed
                .queries
                .iter()
                .any(|name| body.query.contains(name.as_str())),
            OperationKind::Mutation => {
                let resolved = classification.name.or_else(|| {
                    brace_name_regex()
                        .captures(&body.query)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str().to_string())
                });
                match resolved {
                    Some(name) => self.allowed.mutations.contains(&name),
                    None => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(query: &str) -> GraphQlRequestBody {
        GraphQlRequestBody {
            query: query.to_string(),
            operation_name: None,
            variables: None,
        }
    }

    fn classifier() -> OperationClassifier {
        OperationClassifier::new(AllowedOperations::shopify_billing())
    }

    #[test]
    fn test_classify_anonymous_query() {
        let c = classifier().classify(&body("{ shop { name } }")).unwrap();
        assert_eq!(c.kind, OperationKind::Query);
        assert_eq!(c.name, None);
    }

    #[test]
    fn test_classify_explicit_query() {
        let c = classifier()
            .classify(&body("query shopInfo { shop { name } }"))
            .unwrap();
        assert_eq!(c.kind, OperationKind::Query);
        assert_eq!(c.name.as_deref(), Some("shopInfo"));
    }

    #[test]
    fn test_classify_named_mutation() {
        let c = classifier()
            .classify(&body("mutation appSubscriptionCreate { appSubscriptionCreate(name: \"x\") { id } }"))
            .unwrap();
        assert_eq!(c.kind, OperationKind::Mutation);
        assert_eq!(c.name.as_deref(), Some("appSubscriptionCreate"));
    }

    #[test]
    fn test_classify_falls_back_to_operation_name() {
        let mut b = body("mutation { appSubscriptionCancel(id: \"1\") { id } }");
        b.operation_name = Some("appSubscriptionCancel".to_string());
        let c = classifier().classify(&b).unwrap();
        assert_eq!(c.kind, OperationKind::Mutation);
        assert_eq!(c.name.as_deref(), Some("appSubscriptionCancel"));
    }

    #[test]
    fn test_classify_rejects_subscription() {
        // `subscription` is neither keyword; the leading pattern cannot match
        assert!(classifier()
            .classify(&body("subscription onOrder { orders { id } }"))
            .is_none());
    }

    #[test]
    fn test_classify_rejects_garbage() {
        assert!(classifier().classify(&body("")).is_none());
        assert!(classifier().classify(&body("not graphql at all")).is_none());
        assert!(classifier().classify(&body("query name")).is_none());
    }

    #[test]
    fn test_query_admitted_by_substring() {
        let c = classifier();
        assert!(c.is_allowed(&body("query { shop { name } }")));
        assert!(c.is_allowed(&body("{ shop { name } }")));
        assert!(c.is_allowed(&body("query { app { id } }")));
        assert!(c.is_allowed(&body("{ oneTimePurchase(id: \"1\") { status } }")));
    }

    #[test]
    fn test_query_substring_over_admission() {
        // Known looseness: any text containing an allowed name is admitted,
        // even when the selected field differs
        let c = classifier();
        assert!(c.is_allowed(&body("query { shopDetails { id } }")));
    }

    #[test]
    fn test_query_rejected_without_substring() {
        let c = classifier();
        assert!(!c.is_allowed(&body("query { products { id } }")));
        assert!(!c.is_allowed(&body("{ orders { id } }")));
    }

    #[test]
    fn test_mutation_admitted_by_exact_name() {
        let c = classifier();
        assert!(c.is_allowed(&body(
            "mutation appSubscriptionCreate { appSubscriptionCreate(name: \"plan\") { id } }"
        )));
        assert!(c.is_allowed(&body("mutation { webhookSubscriptionDelete(id: \"1\") { id } }")));
    }

    #[test]
    fn test_anonymous_mutation_resolved_from_brace() {
        let c = classifier();
        // No leading name, no operationName: first identifier after `{` decides
        assert!(c.is_allowed(&body("mutation { appUsageRecordCreate(price: 1) { id } }")));
        assert!(!c.is_allowed(&body("mutation { unknownThing }")));
    }

    #[test]
    fn test_mutation_rejected_on_unknown_name() {
        let c = classifier();
        assert!(!c.is_allowed(&body("mutation ordersCancel { ordersCancel { id } }")));
        // Exact match only: no substring looseness for mutations
        assert!(!c.is_allowed(&body("mutation appSubscription { appSubscription { id } }")));
    }

    #[test]
    fn test_mutation_not_admitted_via_operation_name_mismatch() {
        let mut b = body("mutation { stagedUploadsCreate { url } }");
        b.operation_name = Some("notAllowed".to_string());
        assert!(!classifier().is_allowed(&b));
    }

    #[test]
    fn test_empty_allowlist_rejects_everything() {
        let c = OperationClassifier::new(AllowedOperations::new());
        assert!(!c.is_allowed(&body("query { shop { name } }")));
        assert!(!c.is_allowed(&body("mutation { appSubscriptionCreate { id } }")));
    }

    #[test]
    fn test_custom_allowlist() {
        let c = OperationClassifier::new(
            AllowedOperations::new()
                .allow_query("inventory")
                .allow_mutation("inventoryAdjust"),
        );
        assert!(c.is_allowed(&body("{ inventory { count } }")));
        assert!(c.is_allowed(&body("mutation inventoryAdjust { inventoryAdjust { count } }")));
        assert!(!c.is_allowed(&body("{ shop { name } }")));
    }

    #[test]
    fn test_body_from_raw() {
        let b = GraphQlRequestBody::from_raw(
            r#"{"query":"query { shop { name } }","operationName":"shopInfo"}"#,
        )
        .unwrap();
        assert_eq!(b.query, "query { shop { name } }");
        assert_eq!(b.operation_name.as_deref(), Some("shopInfo"));

        assert!(matches!(
            GraphQlRequestBody::from_raw("not json"),
            Err(Error::MalformedRequest(_))
        ));
        assert!(matches!(
            GraphQlRequestBody::from_raw(r#"{"variables":{}}"#),
            Err(Error::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_body_from_value() {
        let b = GraphQlRequestBody::from_value(serde_json::json!({
            "query": "{ shop { name } }",
            "variables": {"first": 10}
        }))
        .unwrap();
        assert_eq!(b.query, "{ shop { name } }");
        assert!(b.variables.is_some());
    }

    #[test]
    fn test_shopify_billing_preset() {
        let allowed = AllowedOperations::shopify_billing();
        assert_eq!(allowed.query_count(), 3);
        assert_eq!(allowed.mutation_count(), 8);
    }

    #[test]
    fn test_leading_whitespace_tolerated() {
        let c = classifier();
        assert!(c.is_allowed(&body("   \n\t query  { shop { name } }")));
        assert!(c.is_allowed(&body("\n  mutation appSubscriptionCancel { appSubscriptionCancel { id } }")));
    }
}
