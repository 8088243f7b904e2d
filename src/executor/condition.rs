use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

use super::resolver::ElementResolver;
use crate::error::EngineResult;
use crate::model::Condition;

/// Evaluates a [`Condition`] against the live screen.
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    async fn evaluate(&self, condition: &Condition) -> EngineResult<bool>;
}

/// Evaluator backed by an [`ElementResolver`].
///
/// `And` stops at the first false operand and `Or` at the first true one, so later
/// operands are never resolved. An empty `And` holds; an empty `Or` does not.
pub struct ResolverConditionEvaluator {
    resolver: Arc<dyn ElementResolver>,
}

impl ResolverConditionEvaluator {
    pub fn new(resolver: Arc<dyn ElementResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl ConditionEvaluator for ResolverConditionEvaluator {
    async fn evaluate(&self, condition: &Condition) -> EngineResult<bool> {
        let result = match condition {
            Condition::ElementExists { identifier } => {
                self.resolver.find(identifier).await?.is_some()
            }
            Condition::ElementNotExists { identifier } => {
                self.resolver.find(identifier).await?.is_none()
            }
            Condition::And { conditions } => {
                for c in conditions {
                    if !self.evaluate(c).await? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Or { conditions } => {
                for c in conditions {
                    if self.evaluate(c).await? {
                        return Ok(true);
                    }
                }
                false
            }
            Condition::Not { condition } => !self.evaluate(condition).await?,
        };
        trace!(target: "stepbot::condition", result, "Evaluated condition");
        Ok(result)
    }
}
