//! Orbit generation: the original code plus a set of rewritten variants.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::OrbitConfig;
use crate::digest::sha256_hex;
use crate::errors::OrbitError;
use crate::transform::{detect_language, Language, TransformEngine, TransformType};

const VARIANT_ID_LEN: usize = 16;

/// One member of an orbit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVariant {
    pub id: String,
    pub original_code: String,
    pub transformed_code: String,
    pub transform_type: TransformType,
    pub details: BTreeMap<String, String>,
}

impl CodeVariant {
    pub fn new(
        original_code: &str,
        transformed_code: String,
        transform_type: TransformType,
        details: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: variant_id(&transformed_code, transform_type),
            original_code: original_code.to_string(),
            transformed_code,
            transform_type,
            details,
        }
    }

    pub fn identity(code: &str) -> Self {
        Self::new(code, code.to_string(), TransformType::Identity, BTreeMap::new())
    }
}

/// Pure function of the rewritten code and the transform that produced it.
pub fn variant_id(transformed_code: &str, transform_type: TransformType) -> String {
    let mut id = sha256_hex(&[transformed_code, transform_type.name()]);
    id.truncate(VARIANT_ID_LEN);
    id
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticOrbit {
    pub original_code: String,
    /// Element 0 is always the identity variant.
    pub variants: Vec<CodeVariant>,
    pub language: Language,
    pub generation_time: Duration,
}

impl SemanticOrbit {
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Distinct rewriting transforms, identity excluded.
    pub fn distinct_transform_types(&self) -> usize {
        self.variants
            .iter()
            .filter(|v| v.transform_type != TransformType::Identity)
            .map(|v| v.transform_type)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn variant(&self, id: &str) -> Option<&CodeVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// An orbit is usable only with enough members from at least two
    /// different rewriters.
    pub fn validate(&self, min_size: usize) -> Result<(), OrbitError> {
        if self.len() < min_size {
            return Err(OrbitError::InsufficientVariants {
                generated: self.len(),
                required: min_size,
            });
        }
        let distinct = self.distinct_transform_types();
        if distinct < 2 {
            return Err(OrbitError::InsufficientDiversity { distinct });
        }
        Ok(())
    }
}

pub struct OrbitGenerator {
    engine: TransformEngine,
    cfg: OrbitConfig,
}

impl OrbitGenerator {
    pub fn new(cfg: OrbitConfig) -> Self {
        Self {
            engine: TransformEngine::from_names(&cfg.transforms),
            cfg,
        }
    }

    pub fn engine(&self) -> &TransformEngine {
        &self.engine
    }

    /// Builds the orbit for `code`.
    ///
    /// Unused transforms are tried first in configured order. Once each has
    /// had its turn, transforms are reused round-robin on top of already
    /// accepted variants so a reuse can still yield new code. Candidates that
    /// are rejected, fail, leave the input unchanged, or duplicate an accepted
    /// variant are dropped.
    pub fn generate(&self, code: &str) -> Result<SemanticOrbit, OrbitError> {
        let started = Instant::now();
        if code.trim().is_empty() {
            return Err(OrbitError::EmptyInput);
        }

        let types = self.engine.types();
        let mut variants = vec![CodeVariant::identity(code)];
        let mut seen: HashSet<String> = HashSet::from([code.to_string()]);
        let mut tried_fresh: HashSet<TransformType> = HashSet::new();
        let mut round_robin = 0usize;
        let budget = self.cfg.max_attempts.saturating_mul(types.len());

        for attempt in 0..budget {
            if variants.len() >= self.cfg.size {
                break;
            }

            let (ty, base) = match types.iter().find(|t| !tried_fresh.contains(*t)) {
                Some(t) => {
                    tried_fresh.insert(*t);
                    (*t, code.to_string())
                }
                None => {
                    let ty = types[round_robin % types.len()];
                    // Rewritten variants start at index 1.
                    let rewrites = variants.len() - 1;
                    let base = if rewrites == 0 {
                        code.to_string()
                    } else {
                        variants[1 + round_robin % rewrites].transformed_code.clone()
                    };
                    round_robin += 1;
                    (ty, base)
                }
            };

            if !ty.can_transform(&base) {
                tracing::trace!(target: "ctvp.orbit", attempt, transform = %ty, "transform not applicable");
                continue;
            }
            let out = match ty.transform(&base) {
                Ok(out) => out,
                Err(e) => {
                    tracing::trace!(target: "ctvp.orbit", attempt, transform = %ty, error = %e, "transform skipped");
                    continue;
                }
            };
            if out.code == code || !seen.insert(out.code.clone()) {
                tracing::trace!(target: "ctvp.orbit", attempt, transform = %ty, "duplicate variant dropped");
                continue;
            }

            let mut details = out.details;
            if base != code {
                details.insert("composed".into(), "true".into());
            }
            variants.push(CodeVariant::new(code, out.code, ty, details));
        }

        let generated = variants.len();
        if generated < self.cfg.min_size {
            tracing::debug!(
                target: "ctvp.orbit",
                generated,
                required = self.cfg.min_size,
                "orbit generation exhausted attempts"
            );
            return Err(OrbitError::InsufficientVariants {
                generated,
                required: self.cfg.min_size,
            });
        }

        let orbit = SemanticOrbit {
            original_code: code.to_string(),
            variants,
            language: detect_language(code),
            generation_time: started.elapsed(),
        };
        tracing::debug!(
            target: "ctvp.orbit",
            variants = orbit.len(),
            distinct = orbit.distinct_transform_types(),
            language = %orbit.language,
            "orbit generated"
        );
        Ok(orbit)
    }
}
